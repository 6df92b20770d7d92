//! CFP Review Backend
//!
//! REST backend for reviewing conference proposals: evaluator assignment,
//! scoring, readiness aggregation and gated accept/reject decisions, with
//! SQLite persistence and Tantivy full-text search.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod review;
mod search;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::Repository;
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting CFP Review Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        allow_resubmission = config.allow_resubmission,
        "Evaluation resubmission policy"
    );

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (CFP_API_PSK). Authentication is disabled!");
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    // Build initial search index from database
    tracing::info!("Building search index...");
    let proposals = repo.list_proposals(None, None, None).await?;
    search.rebuild(&proposals).await?;

    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Datastore
        .route("/datastore/revision", get(api::get_revision))
        .route("/dashboard", get(api::get_dashboard))
        // Members
        .route("/members", get(api::list_members).post(api::create_member))
        .route("/members/{id}", get(api::get_member).put(api::update_member))
        // Proposals
        .route(
            "/proposals",
            get(api::list_proposals).post(api::create_proposal),
        )
        .route(
            "/proposals/{id}",
            get(api::get_proposal).put(api::update_proposal),
        )
        .route(
            "/proposals/{id}/evaluations",
            get(api::list_proposal_evaluations).post(api::assign_evaluator),
        )
        .route("/proposals/{id}/review", get(api::get_review))
        .route("/proposals/{id}/decision", post(api::decide_proposal))
        // Evaluators
        .route(
            "/evaluators",
            get(api::list_evaluators).post(api::create_evaluator),
        )
        .route("/evaluators/{id}", get(api::get_evaluator))
        .route(
            "/evaluators/{id}/evaluations",
            get(api::list_evaluator_evaluations),
        )
        // Evaluations
        .route(
            "/evaluations/{id}",
            get(api::get_evaluation).delete(api::unassign_evaluation),
        )
        .route("/evaluations/{id}/open", post(api::open_evaluation))
        .route("/evaluations/{id}/submit", post(api::submit_evaluation))
        // Sessions
        .route("/sessions", get(api::list_sessions))
        .route("/sessions/{id}", get(api::get_session))
        // Search
        .route("/search", get(api::search_proposals))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
