//! JSON API over the store and the provider views
//!
//! Every read view lives under `/internal`. Handlers that show synced data
//! kick off a background sync of that domain and answer from what is
//! already stored.

mod error;
mod handlers;

pub use error::{ApiError, ApiResult};

use crate::announce::{run_announce_cycle, Announcer};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::random::SharedRandom;
use crate::store::Store;
use crate::sync::{CmeSync, ExoplanetSync, SyncController};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub fetcher: Fetcher,
    pub cache: ResponseCache,
    pub rng: SharedRandom,
    pub cmes: Arc<SyncController<CmeSync>>,
    pub exoplanets: Arc<SyncController<ExoplanetSync>>,
}

impl AppState {
    pub fn new(config: Config, store: Store, rng: SharedRandom) -> Result<Self> {
        let fetcher = Fetcher::new(&config.http)?;
        let cmes = CmeSync::new(fetcher.clone(), config.providers.clone(), &config.sync)?;
        let exoplanets =
            ExoplanetSync::new(fetcher.clone(), config.providers.clone(), Arc::clone(&rng));

        Ok(Self {
            cmes: Arc::new(SyncController::new(cmes, store.clone())),
            exoplanets: Arc::new(SyncController::new(exoplanets, store.clone())),
            cache: ResponseCache::with_capacity(config.cache.max_entries),
            config: Arc::new(config),
            store,
            fetcher,
            rng,
        })
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let internal = Router::new()
        // Posts
        .route("/all_posts", get(handlers::all_posts))
        .route("/post/:immutable_title", get(handlers::post))
        .route("/search", get(handlers::search))
        // Art
        .route("/met_object_search", get(handlers::met_object_search))
        .route("/met_object", get(handlers::met_object))
        .route("/random_met_object", get(handlers::random_met_object))
        .route("/nasa_image_search", get(handlers::nasa_image_search))
        .route("/random_nasa_image", get(handlers::random_nasa_image))
        // Astronomy
        .route("/incoming_asteroids", get(handlers::incoming_asteroids))
        .route("/asteroid_plot_data", get(handlers::asteroid_plot_data))
        .route("/coronal_mass_ejections", get(handlers::coronal_mass_ejections))
        .route("/cme_table", get(handlers::cme_table))
        .route(
            "/all_exoplanet_system_names",
            get(handlers::all_exoplanet_system_names),
        )
        .route("/exoplanetary_system", get(handlers::exoplanetary_system))
        .route(
            "/exoplanetary_system_render",
            get(handlers::exoplanetary_system_render),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/internal", internal)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the announce cycle every `sync.announce_interval_hours`, starting
/// immediately
pub fn spawn_announce_scheduler(
    state: AppState,
    announcer: Arc<dyn Announcer>,
) -> JoinHandle<()> {
    let period = state.config.sync.announce_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match run_announce_cycle(
                &state.exoplanets,
                &state.store,
                announcer.as_ref(),
                state.rng.as_ref(),
                Utc::now(),
            )
            .await
            {
                Ok(outcome) => info!("Announce cycle: {:?}", outcome),
                Err(e) => warn!("Announce cycle failed: {}", e),
            }
        }
    })
}

/// Serve until Ctrl-C
pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
