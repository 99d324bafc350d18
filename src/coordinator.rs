//! Fixed-rate scheduler for periodic refresh jobs that share one upstream.
//!
//! Every job has its own interval, but all of them run on a single task and
//! one at a time, in the order they were registered. Two jobs that come due
//! together therefore never hit the upstream concurrently: the second starts
//! only after the first has finished its whole cycle.
//!
//! A job's next due time advances by exactly its interval after each run
//! (fixed-rate). A job that falls behind runs back-to-back until it catches
//! up instead of drifting later and later.

use crate::utils::fmt_duration;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Outcome counters for one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Keys whose records were replaced.
    pub updated: usize,
    /// Keys the upstream had no records for; previous data kept.
    pub empty: usize,
    /// Keys that failed; previous data kept.
    pub failed: usize,
    /// The cycle stopped early because of cancellation.
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// A data source that can be refreshed in full by the coordinator.
#[async_trait]
pub trait Refreshable: Send + Sync {
    fn name(&self) -> &str;

    /// Disabled refreshables are never scheduled.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Run one complete refresh. Must contain its own failures and should
    /// return promptly once `cancel` fires.
    async fn refresh_all_once(&self, cancel: &CancellationToken) -> RefreshSummary;
}

struct ScheduledJob {
    refreshable: Arc<dyn Refreshable>,
    interval: Duration,
    /// `None` while unarmed or when the job can never run.
    next_due: Option<Instant>,
}

impl ScheduledJob {
    fn is_schedulable(&self) -> bool {
        !self.interval.is_zero() && self.refreshable.is_enabled()
    }
}

/// Runs registered jobs in priority order on one background task.
#[derive(Default)]
pub struct RefreshCoordinator {
    jobs: Vec<ScheduledJob>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Jobs registered earlier take priority when several are
    /// due at the same wake. A zero `interval` disables the job.
    pub fn with_job(mut self, refreshable: Arc<dyn Refreshable>, interval: Duration) -> Self {
        self.jobs.push(ScheduledJob {
            refreshable,
            interval,
            next_due: None,
        });
        self
    }

    /// Whether at least one registered job can ever run.
    pub fn has_schedulable_jobs(&self) -> bool {
        self.jobs.iter().any(ScheduledJob::is_schedulable)
    }

    /// Spawn the scheduling loop. Returns `None` without spawning anything
    /// when no job can run.
    pub fn start(self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.has_schedulable_jobs() {
            info!("No refresh jobs enabled, coordinator will not run");
            return None;
        }
        Some(tokio::spawn(self.run(cancel)))
    }

    /// Scheduling loop. Every enabled job runs immediately, then on its own
    /// fixed-rate schedule, until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.arm(Instant::now());
        info!(jobs = ?self.job_names(), "Refresh coordinator started");

        while let Some(wake) = self.next_wake() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = time::sleep_until(wake) => {}
            }

            self.run_due(Instant::now(), &cancel).await;
            if cancel.is_cancelled() {
                break;
            }
        }

        info!("Refresh coordinator stopped");
    }

    /// Make every schedulable job due at `start`.
    fn arm(&mut self, start: Instant) {
        for job in &mut self.jobs {
            job.next_due = job.is_schedulable().then_some(start);
        }
    }

    /// Earliest due time across all jobs, or `None` if nothing is scheduled.
    fn next_wake(&self) -> Option<Instant> {
        self.jobs.iter().filter_map(|job| job.next_due).min()
    }

    /// Run, in priority order, every job due at `now`, each to completion
    /// before the next begins.
    async fn run_due(&mut self, now: Instant, cancel: &CancellationToken) {
        for job in &mut self.jobs {
            if cancel.is_cancelled() {
                return;
            }
            let Some(due) = job.next_due else {
                continue;
            };
            if now < due {
                continue;
            }

            let name = job.refreshable.name().to_owned();
            let summary = job.refreshable.refresh_all_once(cancel).await;
            if summary.cancelled {
                return;
            }

            let next_due = due + job.interval;
            job.next_due = Some(next_due);

            info!(
                job = %name,
                updated = summary.updated,
                empty = summary.empty,
                failed = summary.failed,
                duration = fmt_duration(summary.elapsed),
                "Refresh cycle completed"
            );
            if next_due <= Instant::now() {
                warn!(job = %name, interval = fmt_duration(job.interval), "Refresh is behind schedule");
            }
        }
    }

    fn job_names(&self) -> Vec<&str> {
        self.jobs
            .iter()
            .filter(|job| job.is_schedulable())
            .map(|job| job.refreshable.name())
            .collect()
    }

    /// Next due time of the job registered under `name`.
    pub fn next_due(&self, name: &str) -> Option<Instant> {
        self.jobs
            .iter()
            .find(|job| job.refreshable.name() == name)
            .and_then(|job| job.next_due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records start/end events and takes `work` of (virtual) time per cycle.
    struct FakeJob {
        name: &'static str,
        work: Duration,
        enabled: bool,
        log: Log,
    }

    impl FakeJob {
        fn new(name: &'static str, work: Duration, log: &Log) -> Arc<Self> {
            Arc::new(Self {
                name,
                work,
                enabled: true,
                log: log.clone(),
            })
        }
    }

    #[async_trait]
    impl Refreshable for FakeJob {
        fn name(&self) -> &str {
            self.name
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn refresh_all_once(&self, cancel: &CancellationToken) -> RefreshSummary {
            self.log.lock().unwrap().push(format!("{}:start", self.name));
            let cancelled = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = time::sleep(self.work) => false,
            };
            self.log.lock().unwrap().push(format!("{}:end", self.name));
            RefreshSummary {
                updated: 1,
                cancelled,
                elapsed: self.work,
                ..Default::default()
            }
        }
    }

    fn events(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    async fn wake_once(coordinator: &mut RefreshCoordinator, cancel: &CancellationToken) {
        let wake = coordinator.next_wake().expect("a job is scheduled");
        time::sleep_until(wake).await;
        coordinator.run_due(Instant::now(), cancel).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_due_jobs_run_in_priority_order() {
        let log = Log::default();
        let cancel = CancellationToken::new();
        let mut coordinator = RefreshCoordinator::new()
            .with_job(FakeJob::new("a", Duration::from_secs(5), &log), Duration::from_secs(60))
            .with_job(FakeJob::new("b", Duration::from_secs(1), &log), Duration::from_secs(60));

        coordinator.arm(Instant::now());
        wake_once(&mut coordinator, &cancel).await;

        assert_eq!(events(&log), ["a:start", "a:end", "b:start", "b:end"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_is_registration_order_not_due_order() {
        let log = Log::default();
        let cancel = CancellationToken::new();
        let mut coordinator = RefreshCoordinator::new()
            .with_job(FakeJob::new("first", Duration::ZERO, &log), Duration::from_secs(10))
            .with_job(FakeJob::new("second", Duration::ZERO, &log), Duration::from_secs(10));

        let start = Instant::now();
        coordinator.arm(start);
        // make the second job overdue before the first
        coordinator.jobs[1].next_due = Some(start - Duration::from_secs(5));
        wake_once(&mut coordinator, &cancel).await;

        assert_eq!(
            events(&log),
            ["first:start", "first:end", "second:start", "second:end"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_due_advances_by_interval_not_by_completion() {
        let log = Log::default();
        let cancel = CancellationToken::new();
        let interval = Duration::from_secs(10);
        let mut coordinator = RefreshCoordinator::new()
            .with_job(FakeJob::new("slow", Duration::from_secs(3), &log), interval);

        let start = Instant::now();
        coordinator.arm(start);
        for n in 1..=5u32 {
            wake_once(&mut coordinator, &cancel).await;
            assert_eq!(coordinator.next_due("slow"), Some(start + interval * n));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_behind_schedule_catches_up_back_to_back() {
        let log = Log::default();
        let cancel = CancellationToken::new();
        let interval = Duration::from_secs(10);
        let mut coordinator = RefreshCoordinator::new()
            .with_job(FakeJob::new("overrun", Duration::from_secs(25), &log), interval);

        let start = Instant::now();
        coordinator.arm(start);
        for n in 1..=3u32 {
            wake_once(&mut coordinator, &cancel).await;
            assert_eq!(coordinator.next_due("overrun"), Some(start + interval * n));
        }
        // three 25s cycles ran without any sleep in between
        assert_eq!(Instant::now() - start, Duration::from_secs(75));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_and_disabled_jobs_never_run() {
        let log = Log::default();
        let disabled = Arc::new(FakeJob {
            name: "disabled",
            work: Duration::ZERO,
            enabled: false,
            log: log.clone(),
        });
        let coordinator = RefreshCoordinator::new()
            .with_job(FakeJob::new("zero", Duration::ZERO, &log), Duration::ZERO)
            .with_job(disabled, Duration::from_secs(10));

        assert!(!coordinator.has_schedulable_jobs());
        assert!(coordinator.start(CancellationToken::new()).is_none());
        assert!(events(&log).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_coordinator_does_not_start() {
        assert!(RefreshCoordinator::new().start(CancellationToken::new()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_until_cancelled() {
        let log = Log::default();
        let cancel = CancellationToken::new();
        let coordinator = RefreshCoordinator::new()
            .with_job(FakeJob::new("a", Duration::from_secs(1), &log), Duration::from_secs(10))
            .with_job(FakeJob::new("b", Duration::from_secs(1), &log), Duration::from_secs(20));

        let handle = coordinator.start(cancel.clone()).expect("jobs are enabled");
        // a runs at 0,10,20,30; b runs at 1 (after a), 20 (after a)
        time::sleep(Duration::from_secs(35)).await;
        cancel.cancel();
        handle.await.unwrap();

        let starts: Vec<String> = events(&log)
            .into_iter()
            .filter(|e| e.ends_with(":start"))
            .collect();
        assert_eq!(starts, ["a:start", "b:start", "a:start", "a:start", "b:start", "a:start"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_refresh_stops_promptly() {
        let log = Log::default();
        let cancel = CancellationToken::new();
        let coordinator = RefreshCoordinator::new()
            .with_job(FakeJob::new("long", Duration::from_secs(3600), &log), Duration::from_secs(7200))
            .with_job(FakeJob::new("next", Duration::from_secs(1), &log), Duration::from_secs(7200));

        let handle = coordinator.start(cancel.clone()).expect("jobs are enabled");
        time::sleep(Duration::from_secs(5)).await;

        let cancelled_at = Instant::now();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(Instant::now(), cancelled_at);
        assert_eq!(events(&log), ["long:start", "long:end"]);
    }
}
