//! Interval Scheduler
//!
//! Drives the keeper on a fixed wall-clock interval. The daemon loop
//! polls once a minute, runs a cycle when the interval has elapsed,
//! and observes a shutdown flag between polls so a termination signal
//! stops the loop without interrupting an in-flight cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::keeper::Keeper;
use crate::types::CycleSummary;

/// Wait-loop granularity. Check cadence is measured in hours, so a
/// one-minute poll is plenty.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Schedules and runs keep-alive cycles.
pub struct Scheduler {
    keeper: Keeper,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(keeper: Keeper) -> Self {
        Self {
            keeper,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request a graceful stop. Observed by the daemon loop at the
    /// next poll; the current cycle runs to completion.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run a single keep-alive cycle, bypassing the wait loop.
    pub async fn run_once(&self) -> CycleSummary {
        self.keeper.run_once().await
    }

    /// Run the scheduler as a daemon until a shutdown signal arrives.
    ///
    /// Optionally runs one cycle immediately, then waits for the
    /// configured interval between cycles. Returns the summary of the
    /// last completed cycle, or `None` if the daemon was stopped
    /// before any cycle ran.
    pub async fn run_daemon(&self, run_immediately: bool) -> Option<CycleSummary> {
        let interval_hours = self.keeper.config().interval_hours;
        info!("Starting supakeeper daemon (interval: {interval_hours} hours)");

        self.running.store(true, Ordering::SeqCst);
        spawn_signal_listener(self.running.clone());

        let mut next_run = Utc::now() + interval_duration(interval_hours);
        let mut last_summary = None;

        if run_immediately {
            last_summary = Some(self.run_job(&mut next_run).await);
        }

        let mut tick = tokio::time::interval(POLL_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            if Utc::now() >= next_run {
                last_summary = Some(self.run_job(&mut next_run).await);
            }
        }

        info!("Scheduler stopped");
        last_summary
    }

    /// Execute one scheduled cycle and recompute the next run time.
    async fn run_job(&self, next_run: &mut DateTime<Utc>) -> CycleSummary {
        info!("{}", "=".repeat(50));
        info!("Running scheduled keep-alive at {}", Utc::now());

        let summary = self.keeper.run_once().await;

        *next_run = Utc::now() + interval_duration(self.keeper.config().interval_hours);
        info!("Next run scheduled for: {next_run}");

        summary
    }
}

fn interval_duration(hours: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((hours * 3_600_000.0) as i64)
}

/// Install a background task that flips the running flag on
/// SIGINT/SIGTERM. The flag is only observed between polls, so
/// in-flight work is never interrupted.
fn spawn_signal_listener(running: Arc<AtomicBool>) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Received shutdown signal, stopping scheduler...");
        running.store(false, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::Config;

    fn empty_scheduler() -> Scheduler {
        let config = Config {
            console_output: false,
            ..Config::default()
        };
        Scheduler::new(Keeper::new(config))
    }

    #[tokio::test]
    async fn test_one_shot_returns_cycle_summary() {
        let scheduler = empty_scheduler();
        let summary = scheduler.run_once().await;
        assert_eq!(summary, CycleSummary::empty());
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_flag_ends_daemon_without_a_cycle() {
        let scheduler = Arc::new(empty_scheduler());

        let daemon = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_daemon(false).await })
        };

        // Let the daemon start, then request a stop.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(scheduler.is_running());
        scheduler.stop();

        // The loop notices the flag within one poll interval.
        let last = daemon.await.unwrap();
        assert!(last.is_none());
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_run_produces_a_summary() {
        let scheduler = Arc::new(empty_scheduler());

        let daemon = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_daemon(true).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.stop();

        let last = daemon.await.unwrap();
        assert_eq!(last, Some(CycleSummary::empty()));
    }

    #[test]
    fn test_interval_duration_arithmetic() {
        assert_eq!(interval_duration(48.0), chrono::Duration::hours(48));
        assert_eq!(interval_duration(0.5), chrono::Duration::minutes(30));
    }
}
