//! Scheduled cache refresh.
//!
//! This module provides:
//! - [`CronSchedule`]: five-field cron expressions
//! - [`RefreshJob`]: per-partition refresh with bounded retries
//! - [`RefreshScheduler`]: the cron-driven orchestrator running the jobs

mod cron;
mod job;
mod retry;
mod scheduler;

pub use cron::CronSchedule;
pub use job::{job_id, PartitionOutcome, RefreshJob, RefreshReport, Refresher};
pub use retry::{RetryPolicy, DEFAULT_RETRY_BACKOFF, DEFAULT_RETRY_TIMES};
pub use scheduler::{RefreshScheduler, SchedulerState, SchedulerTimezone};
