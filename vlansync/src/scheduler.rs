//! Fixed-cadence reconciliation loop.
//!
//! The scheduler moves through `Idle -> Running -> (Succeeded | Failed) -> Idle`
//! until the shutdown channel flips to `true` or its sender is dropped.
//! Shutdown is observed while idle only, so a running cycle always
//! finishes. A failed cycle is logged and the loop carries on.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::reconciler::{CycleReport, Reconcile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Cycle counters, kept for the lifetime of the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
}

pub struct Scheduler<R> {
    reconciler: R,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
    state: SchedulerState,
    stats: SchedulerStats,
}

impl<R: Reconcile> Scheduler<R> {
    pub fn new(reconciler: R, interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            reconciler,
            interval,
            shutdown,
            state: SchedulerState::Idle,
            stats: SchedulerStats::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Loop until shutdown. Never returns an error.
    pub async fn run(&mut self) {
        info!(interval = ?self.interval, "Scheduler started");

        loop {
            self.transition(SchedulerState::Idle);
            if !self.wait_for_tick().await {
                break;
            }
            self.run_once().await;
        }

        info!(
            cycles = self.stats.cycles,
            failures = self.stats.failures,
            "Scheduler stopped"
        );
    }

    /// Run a single cycle with the same failure isolation as [`run`](Self::run).
    pub async fn run_once(&mut self) -> Option<CycleReport> {
        self.transition(SchedulerState::Running);
        self.stats.cycles += 1;

        match self.reconciler.reconcile().await {
            Ok(report) => {
                self.stats.consecutive_failures = 0;
                self.transition(SchedulerState::Succeeded);
                if report.changed() {
                    info!(
                        host = %report.host,
                        created = report.created,
                        updated = report.updated,
                        deleted = report.deleted,
                        "Reconciliation cycle applied changes"
                    );
                } else {
                    debug!(host = %report.host, "Reconciliation cycle found no drift");
                }
                Some(report)
            }
            Err(e) => {
                self.stats.failures += 1;
                self.stats.consecutive_failures += 1;
                self.transition(SchedulerState::Failed);
                error!(
                    kind = e.kind(),
                    consecutive_failures = self.stats.consecutive_failures,
                    "Reconciliation cycle failed: {}",
                    e
                );
                None
            }
        }
    }

    /// Wait one interval. Returns false if shutdown was requested instead.
    /// An interval too large to add to the clock never ticks.
    async fn wait_for_tick(&mut self) -> bool {
        let deadline = Instant::now().checked_add(self.interval);
        let tick = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(tick);

        loop {
            if *self.shutdown.borrow_and_update() {
                return false;
            }
            tokio::select! {
                _ = &mut tick => return true,
                changed = self.shutdown.changed() => {
                    // sender gone: nobody can stop us any more, so stop now
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!(from = ?self.state, to = ?next, "Scheduler state");
        self.state = next;
    }
}
