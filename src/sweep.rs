//! Background task that completes campaigns whose end date has passed.
//!
//! Lazy expiry on the read path already guarantees no reader observes a
//! stale `active` campaign; this sweep keeps list views and reporting
//! queries current for campaigns nobody is reading.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{error, info};

use crate::config::Config;
use crate::lifecycle;
use crate::models::unix_now;

pub struct SweeperState {
    pub pool: SqlitePool,
    pub config: Config,
}

/// Run the expiry sweep loop as a background [`tokio`] task.
pub async fn run(state: Arc<SweeperState>) {
    info!(
        "Expiry sweeper starting — interval {}s",
        state.config.sweep_interval_secs
    );

    loop {
        match lifecycle::sweep_expired(&state.pool, unix_now()).await {
            Ok(0) => {}
            Ok(n) => info!("Expiry sweep completed {n} campaign(s)"),
            Err(e) => error!("Expiry sweep error: {e}"),
        }

        tokio::time::sleep(Duration::from_secs(state.config.sweep_interval_secs)).await;
    }
}
