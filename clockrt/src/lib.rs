//! Monotonic clock, cancel token, and the cooperative scheduling loop
//! (§4.2, C2).
//!
//! The cycle engine is generic over `ports::Clock`/`ports::CancelSignal`
//! so tests can swap in a fake clock; this crate provides the real,
//! process-wide implementations plus `run_loop`, which guarantees no two
//! cycles ever overlap (§4.2: "a second invocation never begins before
//! the previous returns").

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ports::{CancelSignal, Clock};
use tokio::sync::Notify;

/// Wall clock that clamps against the last observed value so `now_ms`
/// never regresses within a process, even if the OS clock steps
/// backwards (NTP correction, VM pause/resume).
pub struct SystemClock {
    last_ms: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            last_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        let observed = Utc::now().timestamp_millis();
        let mut prev = self.last_ms.load(Ordering::Relaxed);
        loop {
            if observed <= prev {
                return prev;
            }
            match self.last_ms.compare_exchange_weak(
                prev,
                observed,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return observed,
                Err(actual) => prev = actual,
            }
        }
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let ms = self.now_ms();
        Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
    }
}

/// Cooperative cancellation signal. Cloning shares the same underlying
/// flag — all clones observe the same cancellation.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: std::sync::atomic::AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: std::sync::atomic::AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CancelSignal for CancelToken {
    async fn cancelled(&self) {
        // Register as a waiter before checking the flag, otherwise a
        // cancel() that lands between the check and the await is missed.
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}

/// Sleeps for `ms` milliseconds, or returns early if `cancel` fires first.
pub async fn sleep_cancellable(ms: u64, cancel: &CancelToken) {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
        _ = cancel.cancelled() => {}
    }
}

/// Drives `cycle_fn` sequentially, sleeping `interval_ms` between runs.
///
/// The interval timer starts *after* the cycle completes, so real wall
/// time between cycle starts is `cycle_duration + interval_ms` (§4.2).
/// Errors from `cycle_fn` are logged and never stop the loop; only
/// cancellation does, and even then the in-flight cycle is allowed to run
/// to completion first (§5, Cancellation) — the caller is responsible for
/// making `cycle_fn` itself check `cancel` only at safe points, typically
/// only before its own state-persistence step is skipped, never mid-step.
pub async fn run_loop<F, Fut>(mut cycle_fn: F, interval_ms: u64, cancel: CancelToken)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    loop {
        if cancel.is_cancelled() {
            break;
        }

        if let Err(err) = cycle_fn().await {
            tracing::error!(error = %err, "cycle failed; continuing loop");
        }

        if cancel.is_cancelled() {
            break;
        }

        sleep_cancellable(interval_ms, &cancel).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn system_clock_never_regresses() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_cancellable_returns_early_on_cancel() {
        let cancel = CancelToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel2.cancel();
        });
        let start = tokio::time::Instant::now();
        sleep_cancellable(10_000, &cancel).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_never_overlaps_cycles() {
        let cancel = CancelToken::new();
        let cancel_for_cycle = cancel.clone();
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let count = Arc::new(AtomicUsize::new(0));

        let active2 = active.clone();
        let max_active2 = max_active.clone();
        let count2 = count.clone();

        run_loop(
            move || {
                let active = active2.clone();
                let max_active = max_active2.clone();
                let count = count2.clone();
                let cancel = cancel_for_cycle.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    if count.fetch_add(1, Ordering::SeqCst) >= 2 {
                        cancel.cancel();
                    }
                    Ok(())
                }
            },
            5,
            cancel,
        )
        .await;

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(count.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_continues_after_cycle_error() {
        let cancel = CancelToken::new();
        let cancel_for_cycle = cancel.clone();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();

        run_loop(
            move || {
                let count = count2.clone();
                let cancel = cancel_for_cycle.clone();
                async move {
                    let n = count.fetch_add(1, Ordering::SeqCst) + 1;
                    if n >= 3 {
                        cancel.cancel();
                    }
                    anyhow::bail!("boom")
                }
            },
            1,
            cancel,
        )
        .await;

        assert!(count.load(Ordering::SeqCst) >= 3);
    }
}
