//! orrery CLI entry point

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use orrery::{
    commands::{
        cmd_announce, cmd_init, cmd_post_add, cmd_post_list, cmd_post_publish, cmd_search,
        cmd_serve, cmd_status, cmd_sync, print_announce_outcome, print_post, print_posts,
        print_search_hits, print_status, print_sync_outcome, PostAddOptions, SyncTarget,
    },
    config::Config,
    error::{Error, Result},
    store::Store,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "orrery")]
#[command(version, about = "Astronomy and art feeds for a personal blog", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config and create the database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Run the HTTP API and the announce scheduler
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Sync one domain from its provider now
    Sync {
        #[arg(value_enum)]
        target: SyncTarget,

        /// Treat this day (YYYY-MM-DD) as the last update
        #[arg(long)]
        since: Option<NaiveDate>,
    },

    /// Run one announce cycle now
    Announce,

    /// Manage blog posts
    Post {
        #[command(subcommand)]
        action: PostAction,
    },

    /// Search published posts
    Search {
        /// The search query
        query: String,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PostAction {
    /// Store a new revision of a post
    Add {
        /// Stable identifier shared by every revision
        #[arg(long)]
        immutable_title: String,

        /// Display title
        #[arg(long)]
        title: String,

        /// Keyword (repeatable)
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        /// Markdown source file
        #[arg(long, conflicts_with = "html", required_unless_present = "html")]
        markdown: Option<PathBuf>,

        /// HTML source file
        #[arg(long)]
        html: Option<PathBuf>,

        /// Preview text (defaults to the first paragraph)
        #[arg(long)]
        preview: Option<String>,

        /// Publish this revision now
        #[arg(long)]
        publish: bool,
    },

    /// Publish the latest revision of a post
    Publish {
        immutable_title: String,
    },

    /// List every revision
    List,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let json_logs = cli.json && matches!(cli.command, Commands::Serve { .. });
    if json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "orrery", &mut std::io::stdout());
        return Ok(());
    }

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force, cli.json).await;
    }

    let config = load_config(cli.config.as_deref())?;
    let store = Store::connect(&config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => {}

        Commands::Serve { bind } => {
            cmd_serve(config, store, bind).await?;
        }

        Commands::Sync { target, since } => {
            store.init_schema().await?;
            let outcome = cmd_sync(&config, &store, target, since).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_sync_outcome(target, &outcome);
            }
        }

        Commands::Announce => {
            store.init_schema().await?;
            let outcome = cmd_announce(&config, &store).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_announce_outcome(&outcome);
            }
        }

        Commands::Post { action } => {
            handle_post(&store, action, cli.json).await?;
        }

        Commands::Search { query } => {
            let hits = cmd_search(&store, &query).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_search_hits(&query, &hits);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config, &store).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

async fn handle_init(path: Option<PathBuf>, force: bool, json: bool) -> Result<()> {
    // A .toml path names the config file itself, anything else its directory
    let base_dir = path.map(|path| {
        if path.extension().map_or(false, |e| e == "toml") {
            path.parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir)
        } else {
            path
        }
    });

    let config = cmd_init(base_dir, force).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "status": "ok",
                "config": config.paths.config_file,
                "database": config.paths.db_file,
            })
        );
        return Ok(());
    }

    println!("✓ orrery initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Database: {}", config.paths.db_file.display());
    println!("\nNext steps:");
    println!("  1. Export {} for the NASA APIs", config.providers.nasa_api_key_env);
    println!("  2. Sync data: orrery sync cme && orrery sync exoplanets");
    println!("  3. Start the API: orrery serve");

    Ok(())
}

async fn handle_post(store: &Store, action: PostAction, json: bool) -> Result<()> {
    let post = match action {
        PostAction::Add {
            immutable_title,
            title,
            keywords,
            markdown,
            html,
            preview,
            publish,
        } => {
            let options = PostAddOptions {
                immutable_title,
                title,
                keywords,
                markdown,
                html,
                preview,
                publish,
            };
            cmd_post_add(store, options).await?
        }

        PostAction::Publish { immutable_title } => {
            cmd_post_publish(store, &immutable_title).await?
        }

        PostAction::List => {
            let posts = cmd_post_list(store).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&posts)?);
            } else {
                print_posts(&posts);
            }
            return Ok(());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&post)?);
    } else {
        print_post(&post);
    }
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}. Run 'orrery init' first.",
            config_path.display()
        )));
    }

    Config::load(&config_path)
}
