//! The Janitor (§4.5): a per-cache background thread that periodically
//! sweeps expired entries so idle, never-read keys don't live forever.
//!
//! Grounded in the teacher's `Cache::purge`/`Cache::monitor` pair
//! (`whitfin-retainer/src/cache.rs`), which separates "one sweep pass" from
//! "the loop that schedules sweep passes on an interval" and logs the same
//! way at `trace`/`debug` level via `log_enabled!` guards. Unlike the
//! teacher's random-sample probabilistic purge, this janitor does a full
//! `select_delete_expired` pass each tick — §4.1's store already exposes that
//! as an O(n) scan with no extra locking, so sampling buys nothing here.

use log::{debug, log_enabled, trace, Level};
use std::hash::Hash;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::store::EntryStore;

/// Runs one sweep pass against `store`, removing every expired entry.
/// Returns the number removed. Exposed standalone so the dispatcher's
/// explicit `purge()` command and the background loop share one code path.
pub fn sweep<K, V>(store: &EntryStore<K, V>, label: &str) -> usize
where
    K: Eq + Hash + Clone,
{
    let start = Instant::now();
    let removed = store.select_delete_expired(crate::entry::now_millis());

    if log_enabled!(Level::Trace) {
        trace!("{label}janitor sweep inspected the store and removed {removed} expired entries");
    }
    if removed > 0 && log_enabled!(Level::Debug) {
        debug!("{label}janitor sweep removed {removed} entries in {:.0?}", start.elapsed());
    }
    removed
}

/// Owns the background sweep thread for one cache.
pub struct Janitor {
    stop: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Janitor {
    /// Spawns a thread that calls `sweep` every `interval`, reporting each
    /// pass's removal count to `on_sweep` (normally the cache's hook pipeline,
    /// firing a `Purge` event). Dropping or calling [`Janitor::shutdown`]
    /// stops the loop before its next tick; whatever sweep is already running
    /// finishes.
    pub fn spawn<K, V, F>(
        store: Arc<EntryStore<K, V>>,
        interval: Duration,
        label: String,
        on_sweep: F,
    ) -> Self
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: Fn(usize) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = std::thread::Builder::new()
            .name(format!("cachewright-janitor-{label}"))
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let removed = sweep(&store, &label);
                        on_sweep(removed);
                    }
                }
            })
            .expect("failed to spawn janitor worker thread");

        Self {
            stop: Some(stop_tx),
            worker: Some(worker),
        }
    }

    /// Signals the loop to stop and joins the thread.
    pub fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sweep_removes_only_expired_entries() {
        let store: EntryStore<String, i32> = EntryStore::new();
        let mut expired = Entry::new(1, Some(10));
        expired.modified -= 1000;
        store.insert("a".to_string(), expired);
        store.insert("b".to_string(), Entry::new(2, None));

        let removed = sweep(&store, "test: ");
        assert_eq!(removed, 1);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn background_loop_sweeps_on_interval_and_reports_counts() {
        let store: Arc<EntryStore<String, i32>> = Arc::new(EntryStore::new());
        let mut expired = Entry::new(1, Some(5));
        expired.modified -= 1000;
        store.insert("a".to_string(), expired);

        let reported = Arc::new(AtomicUsize::new(0));
        let reported2 = reported.clone();
        let mut janitor = Janitor::spawn(
            store.clone(),
            Duration::from_millis(10),
            "bg-test".to_string(),
            move |n| {
                reported2.fetch_add(n, Ordering::SeqCst);
            },
        );

        std::thread::sleep(Duration::from_millis(60));
        janitor.shutdown();

        assert_eq!(store.size(), 0);
        assert!(reported.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn shutdown_stops_the_loop_promptly() {
        let store: Arc<EntryStore<String, i32>> = Arc::new(EntryStore::new());
        let mut janitor = Janitor::spawn(
            store,
            Duration::from_secs(3600),
            "idle".to_string(),
            |_| {},
        );
        let start = Instant::now();
        janitor.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
