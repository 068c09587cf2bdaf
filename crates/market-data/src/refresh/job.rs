//! Refresh jobs and their per-partition retry loop.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::cron::CronSchedule;
use super::retry::RetryPolicy;
use crate::errors::MarketDataError;
use crate::models::{AssetCategory, Market};

/// Something that can reload one partition of a category into the cache.
#[async_trait]
pub trait Refresher: Send + Sync {
    /// Refresh one partition (`None` for unpartitioned categories) and
    /// return the number of items stored.
    async fn refresh(&self, market: Option<Market>) -> Result<usize, MarketDataError>;
}

/// Id of the refresh job of a category, e.g. `refresh_stock`.
pub fn job_id(category: AssetCategory) -> String {
    format!("refresh_{}", category)
}

/// Outcome of one partition within a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionOutcome {
    pub market: Option<Market>,
    pub attempts: u32,
    /// Items stored on success
    pub refreshed: Option<usize>,
    /// Error of the final failed attempt
    pub last_error: Option<String>,
}

impl PartitionOutcome {
    pub fn succeeded(&self) -> bool {
        self.refreshed.is_some()
    }
}

/// Result of one run of a refresh job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshReport {
    pub job_id: String,
    pub outcomes: Vec<PartitionOutcome>,
}

impl RefreshReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(PartitionOutcome::succeeded)
    }

    pub fn failed_partitions(&self) -> Vec<Option<Market>> {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.market)
            .collect()
    }

    pub fn total_refreshed(&self) -> usize {
        self.outcomes.iter().filter_map(|o| o.refreshed).sum()
    }
}

/// A category refresh: cron trigger, partitions and retry budget.
#[derive(Clone)]
pub struct RefreshJob {
    category: AssetCategory,
    schedule: CronSchedule,
    partitions: Vec<Market>,
    refresher: Arc<dyn Refresher>,
    policy: RetryPolicy,
}

impl RefreshJob {
    pub fn new(
        category: AssetCategory,
        schedule: CronSchedule,
        partitions: Vec<Market>,
        refresher: Arc<dyn Refresher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            category,
            schedule,
            partitions,
            refresher,
            policy,
        }
    }

    pub fn id(&self) -> String {
        job_id(self.category)
    }

    pub fn category(&self) -> AssetCategory {
        self.category
    }

    pub fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Refresh every partition in order.
    ///
    /// Each partition gets its own retry budget; exhausting it is logged
    /// and the run moves on to the next partition. Never fails.
    pub async fn run(&self) -> RefreshReport {
        let job_id = self.id();
        let partitions: Vec<Option<Market>> = if self.partitions.is_empty() {
            vec![None]
        } else {
            self.partitions.iter().copied().map(Some).collect()
        };

        info!(job = %job_id, partitions = partitions.len(), "Refresh started");

        let mut outcomes = Vec::with_capacity(partitions.len());
        for market in partitions {
            outcomes.push(self.run_partition(&job_id, market).await);
        }

        let report = RefreshReport { job_id, outcomes };
        info!(
            job = %report.job_id,
            refreshed = report.total_refreshed(),
            failed = report.failed_partitions().len(),
            "Refresh finished"
        );
        report
    }

    async fn run_partition(&self, job_id: &str, market: Option<Market>) -> PartitionOutcome {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.refresher.refresh(market).await {
                Ok(count) => {
                    info!(job = %job_id, ?market, count, attempt, "Partition refreshed");
                    return PartitionOutcome {
                        market,
                        attempts: attempt,
                        refreshed: Some(count),
                        last_error: None,
                    };
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    if attempt < max_attempts {
                        warn!(
                            job = %job_id,
                            ?market,
                            attempt,
                            max_attempts,
                            error = %e,
                            "Partition refresh failed, retrying in {:?}",
                            self.policy.backoff
                        );
                        tokio::time::sleep(self.policy.backoff).await;
                    } else {
                        error!(
                            job = %job_id,
                            category = %self.category,
                            ?market,
                            attempts = max_attempts,
                            error = %e,
                            "Partition refresh exhausted retries"
                        );
                    }
                }
            }
        }

        PartitionOutcome {
            market,
            attempts: max_attempts,
            refreshed: None,
            last_error,
        }
    }
}
