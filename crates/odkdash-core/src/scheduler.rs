//! Periodic background job runner.
//!
//! One loop, one job at a time. The first run happens immediately; later runs
//! follow the period. If a run overshoots the period the next tick is delayed
//! rather than fired in a burst.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

/// Default period between background fetches.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Counters from a finished scheduler loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub runs: u64,
    pub failures: u64,
}

pub struct Scheduler {
    period: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD)
    }
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        // tokio intervals reject a zero period
        let period = if period.is_zero() {
            Duration::from_secs(1)
        } else {
            period
        };
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run `job` every period until `shutdown` resolves.
    ///
    /// Job errors are logged and counted; they never end the loop.
    pub async fn run<F, Fut, T, E, S>(&self, mut job: F, shutdown: S) -> SchedulerStats
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        S: Future<Output = ()>,
    {
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut stats = SchedulerStats::default();
        info!(period_secs = self.period.as_secs(), "Scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    stats.runs += 1;
                    if let Err(e) = job().await {
                        stats.failures += 1;
                        error!(run = stats.runs, error = %e, "Scheduled fetch failed");
                    }
                }
            }
        }

        info!(runs = stats.runs, failures = stats.failures, "Scheduler stopped");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_period() {
        let calls = Cell::new(0u32);
        let scheduler = Scheduler::new(Duration::from_secs(600));

        // Ticks at 0s, 600s, 1200s; stop at 1500s
        let stats = scheduler
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Ok::<_, String>(()) }
                },
                time::sleep(Duration::from_secs(1500)),
            )
            .await;

        assert_eq!(calls.get(), 3);
        assert_eq!(stats, SchedulerStats { runs: 3, failures: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let calls = Cell::new(0u32);
        let scheduler = Scheduler::new(Duration::from_secs(60));

        let stats = scheduler
            .run(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n % 2 == 1 {
                            Err(format!("run {} failed", n))
                        } else {
                            Ok(())
                        }
                    }
                },
                time::sleep(Duration::from_secs(60 * 4 + 30)),
            )
            .await;

        // 0, 60, 120, 180, 240
        assert_eq!(stats.runs, 5);
        assert_eq!(stats.failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_job_is_not_overlapped() {
        let in_flight = Cell::new(0u32);
        let max_in_flight = Cell::new(0u32);
        let (in_flight, max_in_flight) = (&in_flight, &max_in_flight);
        let scheduler = Scheduler::new(Duration::from_secs(10));

        let stats = scheduler
            .run(
                move || {
                    async move {
                        in_flight.set(in_flight.get() + 1);
                        max_in_flight.set(max_in_flight.get().max(in_flight.get()));
                        time::sleep(Duration::from_secs(25)).await;
                        in_flight.set(in_flight.get() - 1);
                        Ok::<_, String>(())
                    }
                },
                time::sleep(Duration::from_secs(100)),
            )
            .await;

        assert_eq!(max_in_flight.get(), 1);
        // Runs start at 0, 25, 50, 75 with Delay behaviour
        assert_eq!(stats.runs, 4);
    }

    #[test]
    fn test_zero_period_is_clamped() {
        assert_eq!(Scheduler::new(Duration::ZERO).period(), Duration::from_secs(1));
        assert_eq!(Scheduler::default().period(), DEFAULT_PERIOD);
    }
}
