// Periodic sweep that expires abandoned gateway orders

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::ReaperConfig;
use crate::orders::OrderService;

/// Start the sweep on its own task. The first run happens one interval
/// after start-up; a slow sweep delays the next one instead of bunching.
pub fn spawn(service: Arc<OrderService>, config: ReaperConfig) -> JoinHandle<()> {
    info!(
        "Abandoned-order reaper every {:?}, timeout {:?}",
        config.interval, config.timeout
    );

    tokio::spawn(async move {
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // `interval` fires immediately once
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_once(&service, &config).await;
        }
    })
}

/// One sweep; errors are logged, never propagated
pub async fn run_once(service: &OrderService, config: &ReaperConfig) {
    match service.expire_abandoned(config.timeout).await {
        Ok(report) if report.examined == 0 => debug!("Reaper: no abandoned orders"),
        Ok(report) => info!(
            "Reaper: examined {}, expired {}, failed {}",
            report.examined, report.expired, report.failed
        ),
        Err(e) => error!("Reaper sweep failed: {}", e),
    }
}
