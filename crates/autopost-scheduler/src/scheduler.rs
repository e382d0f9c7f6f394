//! The polling scheduler loop.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{Job, JobTable, ScheduleState, SchedulerError, StateStore, slot};

/// Outcome of one firing, as reported by the fire handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiringOutcome {
    /// Content was published and archived.
    Published,
    /// Dry run: selection ran, upload and archive were skipped.
    DryRun,
    /// No content was available for this firing.
    NoContent,
    /// All upload attempts failed; terminal for this firing.
    Exhausted,
}

/// Type alias for the firing handler function.
///
/// An `Err` is an unexpected fault; it is logged at the firing boundary
/// and never stops the loop.
pub type FireHandler = Box<
    dyn Fn(Job) -> Pin<Box<dyn Future<Output = Result<FiringOutcome, String>> + Send>>
        + Send
        + Sync,
>;

/// The daily-slot scheduler.
///
/// Owns the job table, the timezone, the persisted next-run mapping and
/// the store it writes through. Jobs due in the same tick fire
/// sequentially in configuration order.
pub struct Scheduler<S: StateStore> {
    table: JobTable,
    tz: Tz,
    store: S,
    next_runs: ScheduleState,
    poll_interval: Duration,
}

impl<S: StateStore> Scheduler<S> {
    /// Create a scheduler, reconciling persisted state against the job
    /// table as of now.
    pub fn new(
        table: JobTable,
        tz: Tz,
        store: S,
        poll_interval: Duration,
    ) -> Result<Self, SchedulerError> {
        Self::starting_at(table, tz, store, poll_interval, Utc::now())
    }

    /// Like [`Scheduler::new`] with an explicit "now" for deterministic
    /// startup.
    ///
    /// Loads prior state, drops entries for jobs no longer configured,
    /// computes a next run for every job without a valid one, and
    /// persists the reconciled mapping before the first poll.
    pub fn starting_at(
        table: JobTable,
        tz: Tz,
        store: S,
        poll_interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, SchedulerError> {
        let mut next_runs = store.load()?;
        next_runs.retain(|id, _| table.contains(id));

        for job in table.jobs() {
            next_runs.entry(job.id.clone()).or_insert_with(|| {
                let next = slot::next_occurrence(tz, job.slot, now);
                info!(job = %job.id, slot = %job.slot, next_run = %next, "computed initial next run");
                next
            });
        }

        // Persist before entering the loop so even a zero-firing run
        // leaves consistent state on disk
        store.save(&next_runs)?;

        let slots: Vec<String> = table
            .jobs()
            .iter()
            .map(|j| format!("{}@{}", j.id, j.slot))
            .collect();
        info!(tz = %tz, jobs = %slots.join(", "), "scheduler initialized");

        Ok(Self {
            table,
            tz,
            store,
            next_runs,
            poll_interval,
        })
    }

    /// The persisted next-run instant for a job.
    pub fn next_run(&self, job_id: &str) -> Option<DateTime<Utc>> {
        self.next_runs.get(job_id).copied()
    }

    /// Jobs whose next run is at or before `now`, in configuration order.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<Job> {
        self.table
            .jobs()
            .iter()
            .filter(|job| {
                self.next_runs
                    .get(&job.id)
                    .is_some_and(|next| *next <= now)
            })
            .cloned()
            .collect()
    }

    /// Fire every due job once and persist each reschedule immediately.
    ///
    /// A job always advances by one local calendar day, whatever the
    /// firing outcome: the in-firing retry policy is the only retry, and
    /// a failed slot must not block tomorrow's. Returns the number of
    /// jobs fired.
    pub async fn tick(
        &mut self,
        now: DateTime<Utc>,
        handler: &FireHandler,
    ) -> Result<usize, SchedulerError> {
        let mut fired = 0;

        for job in self.due_jobs(now) {
            let Some(scheduled) = self.next_run(&job.id) else {
                continue;
            };

            info!(
                job = %job.id,
                slot = %job.slot,
                scheduled_local = %scheduled.with_timezone(&self.tz),
                "executing job"
            );

            match handler(job.clone()).await {
                Ok(FiringOutcome::Published) => {
                    info!(job = %job.id, "job published successfully");
                }
                Ok(FiringOutcome::DryRun) => {
                    info!(job = %job.id, "dry run, upload skipped");
                }
                Ok(FiringOutcome::NoContent) => {
                    error!(job = %job.id, "no content available for this firing");
                }
                Ok(FiringOutcome::Exhausted) => {
                    error!(job = %job.id, "upload attempts exhausted");
                }
                Err(e) => {
                    error!(job = %job.id, error = %e, "unexpected error during firing");
                }
            }

            let next = slot::advance_one_day(scheduled, job.slot, self.tz);
            self.next_runs.insert(job.id.clone(), next);
            self.store.save(&self.next_runs)?;
            info!(job = %job.id, next_run = %next, "rescheduled");

            fired += 1;
        }

        Ok(fired)
    }

    /// Run the polling loop until shutdown.
    ///
    /// With `run_once`, returns after the first tick that fired anything.
    pub async fn run(
        &mut self,
        mut shutdown_rx: watch::Receiver<bool>,
        handler: FireHandler,
        run_once: bool,
    ) -> Result<(), SchedulerError> {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            run_once, "scheduler starting"
        );

        loop {
            if *shutdown_rx.borrow() {
                info!("scheduler shutting down");
                break;
            }

            let fired = self.tick(Utc::now(), &handler).await?;

            if run_once && fired > 0 {
                info!(fired, "run-once pass complete, exiting");
                return Ok(());
            }

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("scheduler received shutdown signal");
                    }
                }
                _ = sleep(self.poll_interval) => {}
            }
        }

        info!("scheduler shut down gracefully");
        Ok(())
    }

    /// The full reconciled mapping (read-only).
    pub fn state(&self) -> &ScheduleState {
        &self.next_runs
    }

    /// The configured job table.
    pub fn table(&self) -> &JobTable {
        &self.table
    }

    /// The scheduling timezone.
    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Warn helper used by binaries that want to surface a stale state file
/// at startup (a next run more than `stale_days` in the past usually
/// means the process was down for a while).
pub fn warn_if_stale(next_runs: &ScheduleState, now: DateTime<Utc>, stale_days: i64) {
    for (job_id, next) in next_runs {
        let lag = now - *next;
        if lag.num_days() >= stale_days {
            warn!(job = %job_id, next_run = %next, days_behind = lag.num_days(), "next run is far in the past, catch-up firings will run one day per tick");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JobKind, MemoryStateStore, SlotTime};
    use chrono_tz::Asia::Kolkata;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn job(id: &str, time: &str) -> Job {
        Job {
            id: id.to_string(),
            slot: time.parse::<SlotTime>().unwrap(),
            kind: JobKind::Any,
        }
    }

    fn table(jobs: Vec<Job>) -> JobTable {
        JobTable::new(jobs).unwrap()
    }

    fn handler_returning(outcome: FiringOutcome) -> FireHandler {
        Box::new(move |_job| Box::pin(async move { Ok(outcome) }))
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> FireHandler {
        Box::new(move |_job| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(FiringOutcome::Published)
            })
        })
    }

    #[test]
    fn test_startup_computes_and_persists_next_runs() {
        let store = MemoryStateStore::new();
        // 08:00 IST on 2024-01-01
        let now = utc("2024-01-01T02:30:00Z");

        let sched = Scheduler::starting_at(
            table(vec![job("slot_1", "09:30")]),
            Kolkata,
            &store,
            Duration::from_secs(20),
            now,
        )
        .unwrap();

        // 09:30 IST == 04:00 UTC
        assert_eq!(sched.next_run("slot_1"), Some(utc("2024-01-01T04:00:00Z")));
        assert_eq!(store.snapshot()["slot_1"], utc("2024-01-01T04:00:00Z"));
    }

    #[test]
    fn test_restart_is_idempotent() {
        let store = MemoryStateStore::new();
        let jobs = vec![job("slot_1", "09:30"), job("slot_2", "15:00")];
        let now = utc("2024-01-01T02:30:00Z");

        let first = Scheduler::starting_at(
            table(jobs.clone()),
            Kolkata,
            &store,
            Duration::from_secs(20),
            now,
        )
        .unwrap();
        let before = store.snapshot();
        drop(first);

        // Restart later the same morning, before any slot elapses
        let second = Scheduler::starting_at(
            table(jobs),
            Kolkata,
            &store,
            Duration::from_secs(20),
            utc("2024-01-01T03:00:00Z"),
        )
        .unwrap();

        assert_eq!(store.snapshot(), before);
        assert_eq!(second.next_run("slot_1"), Some(before["slot_1"]));
    }

    #[test]
    fn test_startup_prunes_unconfigured_jobs() {
        let mut seeded = ScheduleState::new();
        seeded.insert("slot_1".to_string(), utc("2024-01-01T04:00:00Z"));
        seeded.insert("removed".to_string(), utc("2024-01-01T05:00:00Z"));
        let store = MemoryStateStore::with_state(seeded);

        let sched = Scheduler::starting_at(
            table(vec![job("slot_1", "09:30")]),
            Kolkata,
            &store,
            Duration::from_secs(20),
            utc("2024-01-01T02:30:00Z"),
        )
        .unwrap();

        assert!(sched.next_run("removed").is_none());
        assert!(!store.snapshot().contains_key("removed"));
    }

    #[tokio::test]
    async fn test_tick_fires_due_job_and_advances_one_day() {
        let store = MemoryStateStore::new();
        let mut sched = Scheduler::starting_at(
            table(vec![job("slot_1", "09:30")]),
            Kolkata,
            &store,
            Duration::from_secs(20),
            utc("2024-01-01T02:30:00Z"),
        )
        .unwrap();

        // 09:31 IST
        let handler = handler_returning(FiringOutcome::Published);
        let fired = sched.tick(utc("2024-01-01T04:01:00Z"), &handler).await.unwrap();

        assert_eq!(fired, 1);
        assert_eq!(sched.next_run("slot_1"), Some(utc("2024-01-02T04:00:00Z")));
        assert_eq!(store.snapshot()["slot_1"], utc("2024-01-02T04:00:00Z"));
    }

    #[tokio::test]
    async fn test_tick_skips_jobs_not_due() {
        let store = MemoryStateStore::new();
        let mut sched = Scheduler::starting_at(
            table(vec![job("slot_1", "09:30")]),
            Kolkata,
            &store,
            Duration::from_secs(20),
            utc("2024-01-01T02:30:00Z"),
        )
        .unwrap();

        let handler = handler_returning(FiringOutcome::Published);
        let fired = sched.tick(utc("2024-01-01T03:00:00Z"), &handler).await.unwrap();

        assert_eq!(fired, 0);
        assert_eq!(sched.next_run("slot_1"), Some(utc("2024-01-01T04:00:00Z")));
    }

    #[tokio::test]
    async fn test_failed_firing_still_advances() {
        let store = MemoryStateStore::new();
        let mut sched = Scheduler::starting_at(
            table(vec![job("slot_1", "09:30")]),
            Kolkata,
            &store,
            Duration::from_secs(20),
            utc("2024-01-01T02:30:00Z"),
        )
        .unwrap();

        let handler = handler_returning(FiringOutcome::Exhausted);
        sched.tick(utc("2024-01-01T04:01:00Z"), &handler).await.unwrap();

        assert_eq!(sched.next_run("slot_1"), Some(utc("2024-01-02T04:00:00Z")));
    }

    #[tokio::test]
    async fn test_handler_error_is_contained_and_job_advances() {
        let store = MemoryStateStore::new();
        let mut sched = Scheduler::starting_at(
            table(vec![job("slot_1", "09:30")]),
            Kolkata,
            &store,
            Duration::from_secs(20),
            utc("2024-01-01T02:30:00Z"),
        )
        .unwrap();

        let handler: FireHandler =
            Box::new(|_job| Box::pin(async { Err("transport panic".to_string()) }));
        let result = sched.tick(utc("2024-01-01T04:01:00Z"), &handler).await;

        assert!(result.is_ok());
        assert_eq!(sched.next_run("slot_1"), Some(utc("2024-01-02T04:00:00Z")));
    }

    #[tokio::test]
    async fn test_at_most_one_advance_per_job_per_tick() {
        // A job several days behind advances exactly one day per tick
        let mut seeded = ScheduleState::new();
        seeded.insert("slot_1".to_string(), utc("2024-01-01T04:00:00Z"));
        let store = MemoryStateStore::with_state(seeded);

        let mut sched = Scheduler::starting_at(
            table(vec![job("slot_1", "09:30")]),
            Kolkata,
            &store,
            Duration::from_secs(20),
            utc("2024-01-04T12:00:00Z"),
        )
        .unwrap();

        let fires = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&fires));

        let now = utc("2024-01-04T12:00:00Z");
        assert_eq!(sched.tick(now, &handler).await.unwrap(), 1);
        assert_eq!(fires.load(Ordering::SeqCst), 1);
        assert_eq!(sched.next_run("slot_1"), Some(utc("2024-01-02T04:00:00Z")));

        // Catch-up continues on the following ticks, one day each
        assert_eq!(sched.tick(now, &handler).await.unwrap(), 1);
        assert_eq!(sched.next_run("slot_1"), Some(utc("2024-01-03T04:00:00Z")));
    }

    #[tokio::test]
    async fn test_due_jobs_in_configuration_order() {
        let mut seeded = ScheduleState::new();
        seeded.insert("late".to_string(), utc("2024-01-01T04:00:00Z"));
        seeded.insert("early".to_string(), utc("2024-01-01T03:00:00Z"));
        let store = MemoryStateStore::with_state(seeded);

        let sched = Scheduler::starting_at(
            // "late" listed first: configuration order wins over due time
            table(vec![job("late", "09:30"), job("early", "08:30")]),
            Kolkata,
            &store,
            Duration::from_secs(20),
            utc("2024-01-01T05:00:00Z"),
        )
        .unwrap();

        let ids: Vec<String> = sched
            .due_jobs(utc("2024-01-01T05:00:00Z"))
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec!["late", "early"]);
    }

    #[tokio::test]
    async fn test_run_once_exits_after_firing_tick() {
        let mut seeded = ScheduleState::new();
        seeded.insert("slot_1".to_string(), utc("2024-01-01T04:00:00Z"));
        let store = MemoryStateStore::with_state(seeded);

        let mut sched = Scheduler::starting_at(
            table(vec![job("slot_1", "09:30")]),
            Kolkata,
            &store,
            Duration::from_millis(10),
            utc("2024-01-02T12:00:00Z"),
        )
        .unwrap();

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler = handler_returning(FiringOutcome::Published);

        // The job is already due, so the first tick fires and run returns
        sched.run(shutdown_rx, handler, true).await.unwrap();
        assert_eq!(sched.next_run("slot_1"), Some(utc("2024-01-02T04:00:00Z")));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let store = MemoryStateStore::new();
        let mut sched = Scheduler::starting_at(
            table(vec![job("slot_1", "09:30")]),
            Kolkata,
            &store,
            Duration::from_millis(10),
            Utc::now(),
        )
        .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler = handler_returning(FiringOutcome::Published);

        let run = sched.run(shutdown_rx, handler, false);
        tokio::pin!(run);

        tokio::select! {
            _ = &mut run => panic!("loop exited before shutdown"),
            _ = tokio::time::sleep(Duration::from_millis(30)) => {}
        }

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("loop did not stop after shutdown")
            .unwrap();
    }
}
