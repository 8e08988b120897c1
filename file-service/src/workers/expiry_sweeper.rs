use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::SweeperConfig;
use crate::services::{FileService, SweepReport};

/// Periodically purge expired files until the task is dropped
pub async fn start(service: Arc<FileService>, config: SweeperConfig) -> Result<()> {
    if config.interval_seconds == 0 {
        info!("Expiry sweeper disabled");
        return Ok(());
    }

    info!(
        "Expiry sweeper worker started: interval={}s, batch_size={}",
        config.interval_seconds, config.batch_size
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_seconds));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        if let Err(e) = run_once(&service, config.batch_size).await {
            error!("Expiry sweep failed: {}", e);
        }
    }
}

pub async fn run_once(service: &FileService, batch_size: i64) -> Result<SweepReport> {
    let report = service.sweep_expired(Utc::now(), batch_size).await?;

    if report.rows_deleted > 0 || report.blob_failures > 0 {
        info!(
            rows_deleted = report.rows_deleted,
            blobs_deleted = report.blobs_deleted,
            blob_failures = report.blob_failures,
            "Expired files swept"
        );
    }

    Ok(report)
}
