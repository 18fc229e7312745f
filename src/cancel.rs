//! Cancellation tokens and deadline-bounded request execution.
//!
//! Every outbound request runs on a worker thread while the caller waits on
//! a channel, waking every [`POLL_INTERVAL`] to check the token and the
//! deadline. An abandoned worker finishes (or times out inside ureq) on its
//! own and its result is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared flag that aborts an in-flight request when set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can guard the next request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Why a cancellable run ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    TimedOut(Duration),
    Cancelled,
    /// The worker died without producing a result.
    Failed,
}

/// Run `job` on a worker thread, waiting at most `timeout` for its result.
pub fn run_cancellable<T, F>(
    token: &CancelToken,
    timeout: Duration,
    job: F,
) -> Result<T, Interrupted>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    if token.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(job());
    });

    let deadline = Instant::now() + timeout;
    loop {
        if token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(Interrupted::TimedOut(timeout));
        }
        match rx.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
            Ok(value) => return Ok(value),
            Err(RecvTimeoutError::Timeout) => continue,
            // The worker panicked before sending.
            Err(RecvTimeoutError::Disconnected) => return Err(Interrupted::Failed),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_job_result() {
        let token = CancelToken::new();
        let out = run_cancellable(&token, Duration::from_secs(1), || 41 + 1);
        assert_eq!(out, Ok(42));
    }

    #[test]
    fn times_out_slow_job() {
        let token = CancelToken::new();
        let out = run_cancellable(&token, Duration::from_millis(50), || {
            thread::sleep(Duration::from_millis(500));
            1
        });
        assert_eq!(out, Err(Interrupted::TimedOut(Duration::from_millis(50))));
    }

    #[test]
    fn pre_cancelled_token_skips_job() {
        let token = CancelToken::new();
        token.cancel();
        let out = run_cancellable(&token, Duration::from_secs(1), || 1);
        assert_eq!(out, Err(Interrupted::Cancelled));
    }

    #[test]
    fn cancel_from_another_thread_interrupts_wait() {
        let token = CancelToken::new();
        let remote = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });
        let started = Instant::now();
        let out = run_cancellable(&token, Duration::from_secs(5), || {
            thread::sleep(Duration::from_secs(2));
            1
        });
        assert_eq!(out, Err(Interrupted::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn panicking_job_is_reported_as_failed() {
        let token = CancelToken::new();
        let out = run_cancellable(&token, Duration::from_secs(5), || -> u32 {
            panic!("worker exploded");
        });
        assert_eq!(out, Err(Interrupted::Failed));
    }

    #[test]
    fn reset_rearms_token() {
        let token = CancelToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }
}
