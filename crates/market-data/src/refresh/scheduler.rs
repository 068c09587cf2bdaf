//! Cron-driven refresh orchestrator.
//!
//! One tokio task per installed job sleeps until the next firing time and
//! runs the job inline, so runs of the same job never overlap. Stopping the
//! scheduler or replacing a job only retires the trigger loop; a run that is
//! already in progress finishes on its own.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::cron::CronSchedule;
use super::job::{job_id, RefreshJob, RefreshReport, Refresher};
use super::retry::RetryPolicy;
use crate::errors::{MarketDataError, SchedulerError};
use crate::models::{AssetCategory, Market};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    NotStarted,
    Running,
    /// Terminal
    Stopped,
}

/// Timezone cron expressions are evaluated in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerTimezone {
    #[default]
    Utc,
    Local,
}

impl SchedulerTimezone {
    /// Next firing time of `schedule` strictly after `after`.
    pub fn next_fire(&self, schedule: &CronSchedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Utc => schedule.next_after(&after),
            Self::Local => schedule
                .next_after(&after.with_timezone(&Local))
                .map(|at| at.with_timezone(&Utc)),
        }
    }
}

impl fmt::Display for SchedulerTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc => write!(f, "utc"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for SchedulerTimezone {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utc" => Ok(Self::Utc),
            "local" => Ok(Self::Local),
            other => Err(MarketDataError::Config(format!(
                "unknown scheduler timezone '{}', expected utc or local",
                other
            ))),
        }
    }
}

/// Wall clock advanced by tokio's monotonic clock.
///
/// Anchored once when the scheduler starts, so paused-time tests and
/// production share one notion of "now".
#[derive(Clone, Copy)]
struct Clock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.mono.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

struct InstalledJob {
    job: Arc<RefreshJob>,
    /// Dropping this retires the trigger loop.
    _retire: oneshot::Sender<()>,
}

struct Inner {
    state: SchedulerState,
    jobs: HashMap<String, InstalledJob>,
    shutdown: Option<watch::Sender<bool>>,
    clock: Option<Clock>,
}

/// Scheduler of per-category refresh jobs.
///
/// Lifecycle: `NotStarted -> Running -> Stopped`. `start` is a no-op while
/// running and fails once stopped; `stop` is safe in any state.
pub struct RefreshScheduler {
    inner: Mutex<Inner>,
    timezone: SchedulerTimezone,
    policy: RetryPolicy,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(SchedulerTimezone::default(), RetryPolicy::default())
    }
}

impl RefreshScheduler {
    pub fn new(timezone: SchedulerTimezone, policy: RetryPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SchedulerState::NotStarted,
                jobs: HashMap::new(),
                shutdown: None,
                clock: None,
            }),
            timezone,
            policy,
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Refresh scheduler mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.lock_inner().state
    }

    pub fn timezone(&self) -> SchedulerTimezone {
        self.timezone
    }

    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut inner = self.lock_inner();
        match inner.state {
            SchedulerState::Running => {
                debug!("Refresh scheduler already running");
                Ok(())
            }
            SchedulerState::Stopped => Err(SchedulerError::AlreadyStopped),
            SchedulerState::NotStarted => {
                let (shutdown, _) = watch::channel(false);
                inner.shutdown = Some(shutdown);
                inner.clock = Some(Clock::start());
                inner.state = SchedulerState::Running;
                info!(timezone = %self.timezone, "Refresh scheduler started");
                Ok(())
            }
        }
    }

    /// Install (or replace) the refresh job of `category`.
    ///
    /// Each run refreshes `partitions` one after another with the
    /// scheduler's retry policy; an empty list means one unpartitioned
    /// refresh. Must be called from within a tokio runtime. Returns the job
    /// id.
    pub fn register_job(
        &self,
        category: AssetCategory,
        cron_expr: &str,
        partitions: Vec<Market>,
        refresher: Arc<dyn Refresher>,
    ) -> Result<String, SchedulerError> {
        let mut inner = self.lock_inner();
        if inner.state != SchedulerState::Running {
            return Err(SchedulerError::NotRunning);
        }
        let (Some(shutdown), Some(clock)) = (inner.shutdown.as_ref(), inner.clock) else {
            return Err(SchedulerError::NotRunning);
        };

        let schedule = CronSchedule::parse(cron_expr)?;
        let job = Arc::new(RefreshJob::new(
            category,
            schedule,
            partitions,
            refresher,
            self.policy,
        ));
        let id = job.id();

        let (retire_tx, retire_rx) = oneshot::channel();
        tokio::spawn(trigger_loop(
            job.clone(),
            self.timezone,
            clock,
            shutdown.subscribe(),
            retire_rx,
        ));

        let replaced = inner
            .jobs
            .insert(
                id.clone(),
                InstalledJob {
                    job,
                    _retire: retire_tx,
                },
            )
            .is_some();

        info!(job = %id, cron = %cron_expr, replaced, "Refresh job registered");
        Ok(id)
    }

    /// Run the job of `category` once, outside its schedule.
    pub async fn run_now(&self, category: AssetCategory) -> Result<RefreshReport, SchedulerError> {
        let id = job_id(category);
        let job = self
            .lock_inner()
            .jobs
            .get(&id)
            .map(|installed| installed.job.clone())
            .ok_or(SchedulerError::UnknownJob(id))?;
        Ok(job.run().await)
    }

    /// Next firing time of the job of `category`.
    pub fn next_run(&self, category: AssetCategory) -> Option<DateTime<Utc>> {
        let inner = self.lock_inner();
        let clock = inner.clock?;
        let installed = inner.jobs.get(&job_id(category))?;
        self.timezone
            .next_fire(installed.job.schedule(), clock.now())
    }

    /// Ids of the installed jobs, sorted.
    pub fn jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_inner().jobs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop triggering jobs. Runs already in progress are not cancelled.
    pub fn stop(&self) {
        let mut inner = self.lock_inner();
        if inner.state != SchedulerState::Running {
            debug!(state = ?inner.state, "Refresh scheduler not running, nothing to stop");
            return;
        }

        if let Some(shutdown) = inner.shutdown.take() {
            let _ = shutdown.send(true);
        }
        inner.jobs.clear();
        inner.state = SchedulerState::Stopped;
        info!("Refresh scheduler stopped");
    }
}

async fn trigger_loop(
    job: Arc<RefreshJob>,
    timezone: SchedulerTimezone,
    clock: Clock,
    mut shutdown: watch::Receiver<bool>,
    mut retire: oneshot::Receiver<()>,
) {
    let job_id = job.id();
    let mut after = clock.now();

    loop {
        if *shutdown.borrow() {
            return;
        }

        let Some(next) = timezone.next_fire(job.schedule(), after) else {
            warn!(job = %job_id, cron = %job.schedule(), "Cron expression never fires again");
            return;
        };
        let delay = (next - clock.now()).to_std().unwrap_or(Duration::ZERO);
        debug!(job = %job_id, next = %next, "Next refresh scheduled");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                debug!(job = %job_id, "Trigger loop shut down");
                return;
            }
            _ = &mut retire => {
                debug!(job = %job_id, "Trigger loop retired");
                return;
            }
        }

        let run = Arc::clone(&job);
        if let Err(e) = tokio::spawn(async move { run.run().await }).await {
            error!(job = %job_id, error = %e, "Refresh run aborted");
        }
        after = next.max(clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRefresher {
        calls: AtomicUsize,
    }

    impl CountingRefresher {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Refresher for CountingRefresher {
        async fn refresh(&self, _market: Option<Market>) -> Result<usize, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }

    /// Panics on its first call, counts the rest.
    #[derive(Default)]
    struct PanicOnceRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Refresher for PanicOnceRefresher {
        async fn refresh(&self, _market: Option<Market>) -> Result<usize, MarketDataError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("upstream parser bug");
            }
            Ok(1)
        }
    }

    fn scheduler() -> RefreshScheduler {
        RefreshScheduler::new(SchedulerTimezone::Utc, RetryPolicy::no_retry())
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let scheduler = scheduler();
        assert_eq!(scheduler.state(), SchedulerState::NotStarted);

        scheduler.start().unwrap();
        scheduler.start().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(scheduler.start(), Err(SchedulerError::AlreadyStopped));
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_stop_before_start_is_harmless() {
        let scheduler = scheduler();
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::NotStarted);
    }

    #[tokio::test]
    async fn test_register_requires_running_scheduler() {
        let scheduler = scheduler();
        let refresher = Arc::new(CountingRefresher::default());

        let err = scheduler
            .register_job(AssetCategory::Etf, "0 3 * * *", vec![], refresher.clone())
            .unwrap_err();
        assert_eq!(err, SchedulerError::NotRunning);

        scheduler.start().unwrap();
        scheduler.stop();
        let err = scheduler
            .register_job(AssetCategory::Etf, "0 3 * * *", vec![], refresher)
            .unwrap_err();
        assert_eq!(err, SchedulerError::NotRunning);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_cron() {
        let scheduler = scheduler();
        scheduler.start().unwrap();

        let err = scheduler
            .register_job(
                AssetCategory::Fund,
                "every day",
                vec![],
                Arc::new(CountingRefresher::default()),
            )
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { .. }));
        assert!(scheduler.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_replace_keeps_one_job_per_category() {
        let scheduler = scheduler();
        scheduler.start().unwrap();
        let refresher = Arc::new(CountingRefresher::default());

        scheduler
            .register_job(AssetCategory::Stock, "0 2 * * *", Market::ALL.to_vec(), refresher.clone())
            .unwrap();
        scheduler
            .register_job(AssetCategory::Stock, "30 2 * * *", Market::ALL.to_vec(), refresher.clone())
            .unwrap();
        scheduler
            .register_job(AssetCategory::Etf, "0 3 * * *", vec![], refresher)
            .unwrap();

        assert_eq!(scheduler.jobs(), vec!["refresh_etf", "refresh_stock"]);
        let next = scheduler.next_run(AssetCategory::Stock).unwrap();
        assert_eq!(next.format("%M").to_string(), "30");
    }

    #[tokio::test]
    async fn test_run_now() {
        let scheduler = scheduler();
        scheduler.start().unwrap();
        let refresher = Arc::new(CountingRefresher::default());

        let err = scheduler.run_now(AssetCategory::Stock).await.unwrap_err();
        assert_eq!(err, SchedulerError::UnknownJob("refresh_stock".to_string()));

        scheduler
            .register_job(AssetCategory::Stock, "0 2 * * *", Market::ALL.to_vec(), refresher.clone())
            .unwrap();
        let report = scheduler.run_now(AssetCategory::Stock).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(refresher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_fires_on_schedule_until_stopped() {
        let scheduler = scheduler();
        scheduler.start().unwrap();
        let refresher = Arc::new(CountingRefresher::default());
        scheduler
            .register_job(AssetCategory::Fund, "* * * * *", vec![], refresher.clone())
            .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(refresher.calls() >= 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        let fired = refresher.calls();
        assert!(fired >= 3);

        scheduler.stop();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(refresher.calls(), fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_job_stops_firing() {
        let scheduler = scheduler();
        scheduler.start().unwrap();
        let old = Arc::new(CountingRefresher::default());
        let new = Arc::new(CountingRefresher::default());

        scheduler
            .register_job(AssetCategory::Etf, "* * * * *", vec![], old.clone())
            .unwrap();
        scheduler
            .register_job(AssetCategory::Etf, "* * * * *", vec![], new.clone())
            .unwrap();

        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(old.calls(), 0);
        assert!(new.calls() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_run_keeps_schedule_alive() {
        let scheduler = scheduler();
        scheduler.start().unwrap();
        let refresher = Arc::new(PanicOnceRefresher::default());
        scheduler
            .register_job(AssetCategory::Stock, "* * * * *", vec![], refresher.clone())
            .unwrap();

        tokio::time::sleep(Duration::from_secs(181)).await;

        assert!(refresher.calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(scheduler.jobs().len(), 1);
        scheduler.stop();
    }

    #[test]
    fn test_timezone_parsing() {
        assert_eq!("UTC".parse::<SchedulerTimezone>().unwrap(), SchedulerTimezone::Utc);
        assert_eq!(" local ".parse::<SchedulerTimezone>().unwrap(), SchedulerTimezone::Local);
        assert!("mars".parse::<SchedulerTimezone>().is_err());
    }
}
