//! Wires the category services into the refresh scheduler.

use std::sync::Arc;

use tracing::{info, warn};

use crate::main_lib::AppState;

/// Starts the refresh scheduler with one job per category that has
/// fetchers, and optionally warms every cache in the background.
pub fn start_refresh_scheduler(state: Arc<AppState>, warm_on_start: bool) -> anyhow::Result<()> {
    state.scheduler.start()?;

    let categories = state.registry.categories();
    for &category in &categories {
        let Some(service) = state.service(category) else {
            continue;
        };
        let cron = &state.settings.category(category).refresh_cron;
        state.scheduler.register_job(
            category,
            cron,
            category.partitions().to_vec(),
            service.clone(),
        )?;
        info!(
            "Refresh job for {} scheduled ({}), next run: {:?}",
            category,
            cron,
            state.scheduler.next_run(category)
        );
    }

    if categories.is_empty() {
        warn!("No fetchers configured, refresh scheduler has no jobs");
    }

    if warm_on_start {
        tokio::spawn(async move {
            for category in categories {
                match state.scheduler.run_now(category).await {
                    Ok(report) => info!(
                        "Warm-up of {} done: {} items, {} failed partitions",
                        category,
                        report.total_refreshed(),
                        report.failed_partitions().len()
                    ),
                    Err(e) => warn!("Warm-up of {} skipped: {}", category, e),
                }
            }
        });
    }

    Ok(())
}
