//! Retry policy: bounded exponential backoff over whole settlement attempts.
//!
//! Only [`Recoverability::Recoverable`] errors are retried. Everything else,
//! including cancellation, is returned from the first attempt that hits it.
//! When the elapsed-time budget runs out the last recoverable error is
//! returned unchanged.

use rand::{Rng, SeedableRng, rngs::StdRng};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

use super::context::SettleContext;
use super::errors::{Recoverability, SpinResult};
use crate::config::RetryConfig;
use crate::logging;

/// Delay schedule for one retry loop
#[derive(Debug)]
pub struct Backoff {
    config: RetryConfig,
    current: Duration,
    started: Instant,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            current: config.initial_interval,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Next delay, or `None` once sleeping it would overrun the budget
    pub fn next_delay<R: Rng>(&mut self, rng: &mut R) -> Option<Duration> {
        let delay = jitter(self.current, self.config.randomization_factor, rng);
        if self.elapsed() + delay > self.config.max_elapsed {
            return None;
        }

        let grown = self.current.as_secs_f64() * self.config.multiplier;
        self.current = Duration::from_secs_f64(grown.min(self.config.max_interval.as_secs_f64()));
        Some(delay)
    }
}

fn jitter<R: Rng>(interval: Duration, factor: f64, rng: &mut R) -> Duration {
    if factor <= 0.0 {
        return interval;
    }

    let secs = interval.as_secs_f64();
    let delta = secs * factor;
    Duration::from_secs_f64(rng.random_range((secs - delta)..=(secs + delta)))
}

/// Retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails fatally, or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number and must start a fresh
    /// attempt each time; nothing carries over between attempts.
    pub async fn run<T, F, Fut>(&self, ctx: &SettleContext, mut op: F) -> SpinResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = SpinResult<T>>,
    {
        let mut backoff = Backoff::new(self.config);
        let mut rng = StdRng::from_os_rng();
        let mut attempt = 1;

        loop {
            let err = match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            attempt,
                            elapsed_ms = backoff.elapsed().as_millis() as u64,
                            "Settlement succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if err.recoverability() == Recoverability::Fatal {
                return Err(err);
            }

            let Some(delay) = backoff.next_delay(&mut rng) else {
                error!(
                    attempts = attempt,
                    elapsed_ms = backoff.elapsed().as_millis() as u64,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(err);
            };

            logging::log_retry(attempt, delay, &err);

            tokio::select! {
                biased;
                cancelled = ctx.done() => return Err(cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::errors::SpinError;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(initial_ms: u64, multiplier: f64, max_elapsed_ms: u64) -> RetryConfig {
        RetryConfig {
            initial_interval: Duration::from_millis(initial_ms),
            multiplier,
            max_elapsed: Duration::from_millis(max_elapsed_ms),
            max_interval: Duration::from_secs(60),
            randomization_factor: 0.0,
        }
    }

    fn insufficient() -> SpinError {
        SpinError::InsufficientFunds {
            available: Decimal::ONE,
            required: Decimal::TEN,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut cfg = config(100, 2.0, 60_000);
        cfg.max_interval = Duration::from_millis(300);
        let mut backoff = Backoff::new(cfg);
        let mut rng = StdRng::seed_from_u64(1);

        let delays: Vec<_> = (0..4)
            .map(|_| (backoff.next_delay(&mut rng).unwrap().as_secs_f64() * 1000.0).round() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 300, 300]);
    }

    #[test]
    fn test_backoff_stops_at_budget() {
        let mut backoff = Backoff::new(config(500, 1.5, 2000));
        let mut rng = StdRng::seed_from_u64(2);

        // 500 + 750 fit, the third (1125) would overrun 2000 once time has passed
        assert!(backoff.next_delay(&mut rng).is_some());
        assert!(backoff.next_delay(&mut rng).is_some());
        backoff.started -= Duration::from_millis(1250);
        assert!(backoff.next_delay(&mut rng).is_none());
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            let d = jitter(Duration::from_millis(100), 0.5, &mut rng);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let policy = RetryPolicy::new(config(1, 1.0, 1_000));
        let calls = AtomicU32::new(0);

        let result: SpinResult<()> = policy
            .run(&SettleContext::background(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SpinError::AccountNotFound(uuid::Uuid::nil())) }
            })
            .await;

        assert!(matches!(result, Err(SpinError::AccountNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recoverable_error_retried_until_success() {
        let policy = RetryPolicy::new(config(1, 1.0, 1_000));

        let result = policy
            .run(&SettleContext::background(), |attempt| async move {
                if attempt < 3 { Err(insufficient()) } else { Ok(attempt) }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_last_error() {
        let policy = RetryPolicy::new(config(10, 1.5, 100));
        let started = Instant::now();
        let calls = AtomicU32::new(0);

        let result: SpinResult<()> = policy
            .run(&SettleContext::background(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(insufficient()) }
            })
            .await;

        assert!(matches!(result, Err(SpinError::InsufficientFunds { .. })));
        assert!(calls.load(Ordering::SeqCst) > 1);
        assert!(started.elapsed() < Duration::from_millis(100) + Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff_sleep() {
        let policy = RetryPolicy::new(config(10_000, 1.0, 60_000));
        let (ctx, handle) = SettleContext::cancellable();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let started = Instant::now();
        let result: SpinResult<()> = policy.run(&ctx, |_| async { Err(insufficient()) }).await;

        assert!(matches!(result, Err(SpinError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.await.unwrap();
    }
}
