//! CLI commands implementation

pub mod announce;
pub mod init;
pub mod posts;
pub mod serve;
pub mod status;
pub mod sync;

pub use announce::*;
pub use init::*;
pub use posts::*;
pub use serve::*;
pub use status::*;
pub use sync::*;
