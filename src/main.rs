//! Campaign ledger service — entry point.
//!
//! Wires config, the SQLite pool, the singleton quick-donation campaign,
//! a background expiry sweeper, and the Axum REST API.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use campaign_ledger::api::{self, ApiState};
use campaign_ledger::config::Config;
use campaign_ledger::models::unix_now;
use campaign_ledger::sweep::{self, SweeperState};
use campaign_ledger::{campaigns, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // Bootstrap the singleton quick-donation campaign (create-if-absent;
    // the unique slug constraint makes concurrent instances converge).
    let quick = campaigns::ensure_quick_donation(&pool, &config.quick_donation_slug, unix_now())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    info!("Quick-donation campaign ready (id {})", quick.id);

    // ─── Background expiry sweeper ────────────────────────
    let sweeper_state = Arc::new(SweeperState {
        pool: pool.clone(),
        config: config.clone(),
    });
    tokio::spawn(sweep::run(sweeper_state));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(ApiState { pool });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/campaigns", post(api::create_campaign).get(api::list_campaigns))
        .route(
            "/campaigns/:id",
            get(api::get_campaign)
                .patch(api::update_campaign)
                .delete(api::delete_campaign),
        )
        .route("/campaigns/slug/:slug", get(api::get_campaign_by_slug))
        .route("/campaigns/:id/summary", get(api::get_campaign_summary))
        .route("/campaigns/:id/checklist", get(api::get_checklist))
        .route("/campaigns/:id/submit", post(api::submit_campaign))
        .route("/campaigns/:id/approve", post(api::approve_campaign))
        .route("/campaigns/:id/reject", post(api::reject_campaign))
        .route("/campaigns/:id/pause", post(api::pause_campaign))
        .route("/campaigns/:id/resume", post(api::resume_campaign))
        .route("/campaigns/:id/finish", post(api::finish_campaign))
        .route(
            "/campaigns/:id/donations",
            post(api::create_donation).get(api::list_campaign_donations),
        )
        .route("/users/:id/donations", get(api::list_user_donations))
        .route("/donations/:id/settle", post(api::settle_donation))
        .route("/donations/:id/fail", post(api::fail_donation))
        .route("/donations/:id/expire", post(api::expire_donation))
        .route(
            "/campaigns/:id/withdrawals",
            post(api::create_withdrawal).get(api::list_campaign_withdrawals),
        )
        .route("/withdrawals/:id/approve", post(api::approve_withdrawal))
        .route("/withdrawals/:id/reject", post(api::reject_withdrawal))
        .route("/withdrawals/:id/proof", post(api::attach_withdrawal_proof))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
