//! Warmers (§4.10 expansion, §6): periodic background producers that keep a
//! cache pre-populated via the ordinary `put` path, so warmer writes still go
//! through locking, hooks, and eviction.
//!
//! Structured like [`crate::janitor::Janitor`] (stop-channel + background
//! thread) since both are per-cache periodic loops; grounded the same way in
//! the teacher's interval-loop shape.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::entry::Millis;
use crate::error::CacheError;

/// Spawns and owns the background thread for one warmer.
pub struct Warmer {
    stop: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Warmer {
    /// `produce` returns the pairs to write on each run; `put` is the
    /// cache's ordinary write path (so warmer writes are indistinguishable
    /// from caller writes to hooks and the eviction policy).
    ///
    /// If `run_on_start` is set, `produce`/`put` run once on the calling
    /// thread before this returns, blocking `Cache::new` as §4.10 requires.
    /// A panic during that first run is reported as `CacheError::InvalidWarmer`
    /// — there is no configured timeout for it (§9.1: documented limitation).
    pub fn spawn<K, V, P, W>(interval: Duration, run_on_start: bool, produce: P, put: W) -> Result<Self, CacheError>
    where
        K: Send + 'static,
        V: Send + 'static,
        P: Fn() -> Vec<(K, V, Option<Millis>)> + Send + 'static,
        W: Fn(K, V, Option<Millis>) + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(CacheError::InvalidWarmer("interval must be positive".to_string()));
        }

        let run_once = |produce: &P, put: &W| {
            for (k, v, ttl) in produce() {
                put(k, v, ttl);
            }
        };

        if run_on_start {
            let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run_once(&produce, &put)));
            if let Err(payload) = caught {
                return Err(CacheError::InvalidWarmer(crate::error::panic_message(payload)));
            }
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = std::thread::Builder::new()
            .name("cachewright-warmer".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run_once(&produce, &put)));
                    }
                }
            })
            .expect("failed to spawn warmer worker thread");

        Ok(Self {
            stop: Some(stop_tx),
            worker: Some(worker),
        })
    }

    pub fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Warmer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn zero_interval_is_rejected() {
        let result = Warmer::spawn::<String, i32, _, _>(
            Duration::ZERO,
            false,
            || Vec::new(),
            |_, _, _| {},
        );
        assert!(matches!(result, Err(CacheError::InvalidWarmer(_))));
    }

    #[test]
    fn run_on_start_blocks_until_first_pass_completes() {
        let written: Arc<Mutex<Vec<(String, i32)>>> = Arc::new(Mutex::new(Vec::new()));
        let written2 = written.clone();
        let _warmer = Warmer::spawn(
            Duration::from_secs(3600),
            true,
            || vec![("a".to_string(), 1, None)],
            move |k, v, _ttl| written2.lock().push((k, v)),
        )
        .unwrap();
        assert_eq!(*written.lock(), vec![("a".to_string(), 1)]);
    }

    #[test]
    fn run_on_start_panic_is_reported_as_invalid_warmer() {
        let result = Warmer::spawn::<String, i32, _, _>(
            Duration::from_secs(3600),
            true,
            || panic!("producer exploded"),
            |_, _, _| {},
        );
        assert!(matches!(result, Err(CacheError::InvalidWarmer(_))));
    }

    #[test]
    fn background_loop_runs_periodically() {
        let count = Arc::new(Mutex::new(0usize));
        let count2 = count.clone();
        let mut warmer = Warmer::spawn(
            Duration::from_millis(10),
            false,
            || vec![("a".to_string(), 1, None)],
            move |_, _, _| *count2.lock() += 1,
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(60));
        warmer.shutdown();
        assert!(*count.lock() >= 1);
    }
}
