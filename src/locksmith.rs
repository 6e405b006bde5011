//! The Locksmith Queue (§4.3): a per-cache serialization point for writes
//! that conflict with an existing key lock, plus the entry point for
//! transactions.
//!
//! Per the Design Notes (§9), this is "a single-consumer worker with an MPSC
//! channel, not a general actor" — `std::sync::mpsc` plus one background
//! thread, in the same spirit as the teacher's background-thread-free but
//! still explicitly-threaded concurrency story (the teacher leans on
//! `parking_lot` locks rather than actors anywhere it needs exclusivity).
//! Jobs are boxed `FnOnce` closures; each caller gets its result back over a
//! private oneshot `mpsc` channel it owns.

use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::panic_message;
use crate::lock_table::{
    enter_transaction, exit_transaction, hash_key, in_transaction, next_owner_token, LockTable,
};

type Job = Box<dyn FnOnce() + Send>;

/// Per-cache write serialization point.
///
/// Owns a single background worker thread that drains queued jobs in FIFO
/// order. Most writes never touch the queue at all — they take the
/// optimistic "writable, run inline" path in [`Locksmith::execute`] — the
/// queue exists to serialize writes that lose that race, and to host
/// transactions so they run atomically with respect to other queued work.
///
/// Every method but `shutdown` takes `&self`: the only mutable state is the
/// channel endpoint and the worker handle, both behind their own small
/// `Mutex` so that concurrent `execute`/`transaction` calls from different
/// callers never contend on a single lock for the full, possibly-blocking
/// duration of a queued call — only for the instant it takes to hand a job
/// to the channel.
pub struct Locksmith {
    cache_id: u64,
    sender: Mutex<Sender<Job>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Locksmith {
    pub fn new(cache_id: u64) -> Self {
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name(format!("cachewright-locksmith-{cache_id}"))
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })
            .expect("failed to spawn locksmith worker thread");
        Self {
            cache_id,
            sender: Mutex::new(sender),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Runs `f` with exclusive access to `key`, per §4.3:
    ///
    /// 1. Already inside a transaction on this cache → run `f` immediately.
    /// 2. No conflicting lock on `key` → acquire it and run `f` inline.
    /// 3. Otherwise → queue a job that spins for the lock, then runs `f`.
    ///
    /// Returns `Err` if the worker thread has shut down (§5.1), or if `f`
    /// panicked — in which case the panic is caught at this boundary and
    /// never crosses into the worker thread itself (§7.1).
    pub fn execute<F, R>(&self, key: &impl std::hash::Hash, f: F) -> Result<R, Failure>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let table = LockTable::global();
        let cache_id = self.cache_id;

        if in_transaction(cache_id) {
            return run_caught(f);
        }

        let key_hash = hash_key(key);
        let owner = next_owner_token();
        if table.lock(cache_id, &[key_hash], owner) {
            let result = run_caught(f);
            table.unlock(cache_id, &[key_hash]);
            return result;
        }

        self.submit(move || {
            loop {
                if table.lock(cache_id, &[key_hash], owner) {
                    break;
                }
                std::thread::yield_now();
            }
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
            table.unlock(cache_id, &[key_hash]);
            result
        })
        .and_then(|result| result.map_err(|payload| Failure::Panicked(panic_message(payload))))
    }

    /// Acquires locks on every key in `keys`, runs `f` in a transactional
    /// context (so nested writes on those keys bypass queueing), then
    /// releases the locks on every exit path including panics (§4.3, §5).
    ///
    /// The whole sequence — lock, run, unlock — executes on the locksmith's
    /// worker thread so it is atomic with respect to any other queued work
    /// on this cache (§5 ordering guarantees).
    pub fn transaction<F, R>(&self, keys: &[impl std::hash::Hash], f: F) -> Result<R, Failure>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let table = LockTable::global();
        let cache_id = self.cache_id;
        let key_hashes: Vec<u64> = keys.iter().map(hash_key).collect();
        let owner = next_owner_token();

        self.submit(move || {
            loop {
                if table.lock(cache_id, &key_hashes, owner) {
                    break;
                }
                std::thread::yield_now();
            }
            enter_transaction(cache_id);
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
            exit_transaction(cache_id);
            table.unlock(cache_id, &key_hashes);
            result
        })
        .and_then(|result| result.map_err(|payload| Failure::Panicked(panic_message(payload))))
    }

    /// Hands `f` to the worker thread and blocks for its result. A job never
    /// unwinds the worker thread itself — callers that need to catch panics
    /// wrap `f` in their own `catch_unwind` before it reaches here.
    fn submit<F, T>(&self, f: F) -> Result<T, Failure>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<T>();
        let job: Job = Box::new(move || {
            let _ = tx.send(f());
        });
        // Hold the sender lock only long enough to hand off the job — the
        // blocking wait below must happen outside it.
        self.sender.lock().send(job).map_err(|_| Failure::WorkerGone)?;
        rx.recv().map_err(|_| Failure::WorkerGone)
    }

    /// Stops accepting new jobs and joins the worker thread, letting any
    /// already-dequeued job finish but dropping anything still queued (§5.1).
    pub fn shutdown(&self) {
        // The worker's `for job in receiver` loop only ends once every
        // `Sender` is gone. Swap ours out for one whose receiver is already
        // dropped so the channel closes before we join.
        let (dead_tx, _dead_rx) = mpsc::channel();
        *self.sender.lock() = dead_tx;
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Locksmith {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs `f` on the current thread, catching a panic instead of letting it
/// unwind past this boundary (§7.1).
fn run_caught<F, R>(f: F) -> Result<R, Failure>
where
    F: FnOnce() -> R,
{
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
        .map_err(|payload| Failure::Panicked(panic_message(payload)))
}

/// Everything that can keep a locksmith call from returning its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The worker thread had already shut down when the call arrived.
    WorkerGone,
    /// `f` panicked; the payload was downcast to a string where possible.
    Panicked(String),
}

impl From<Failure> for crate::error::CacheError {
    fn from(e: Failure) -> Self {
        match e {
            Failure::WorkerGone => crate::error::CacheError::NotStarted,
            Failure::Panicked(msg) => crate::error::CacheError::Execution(msg),
        }
    }
}

/// Shared handle so multiple dispatcher call sites (and a cache's `Drop`)
/// can hold the same locksmith without duplicating its worker thread.
pub type SharedLocksmith = Arc<Locksmith>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc as StdArc;

    #[test]
    fn inline_execute_runs_and_returns() {
        let ls = Locksmith::new(1001);
        let result = ls.execute(&"k", || 42).unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn contended_write_is_serialized_through_the_queue() {
        let ls = StdArc::new(Locksmith::new(1002));
        let counter = StdArc::new(AtomicU64::new(0));

        let table = LockTable::global();
        let held = crate::lock_table::next_owner_token();
        assert!(table.lock(1002, &[crate::lock_table::hash_key(&"k")], held));

        let ls2 = ls.clone();
        let counter2 = counter.clone();
        let handle = std::thread::spawn(move || {
            ls2.execute(&"k", move || {
                counter2.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        table.unlock(1002, &[crate::lock_table::hash_key(&"k")]);
        handle.join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transaction_releases_locks_even_on_panic() {
        let ls = Locksmith::new(1003);
        let keys = ["a", "b"];
        let res = ls.transaction(&keys, || -> i32 { panic!("boom") });
        assert!(matches!(res, Err(Failure::Panicked(_))));
        // Lock must be released regardless of how the callback exited.
        let table = LockTable::global();
        assert!(table.writable(1003, crate::lock_table::hash_key(&"a"), crate::lock_table::next_owner_token()));
    }

    #[test]
    fn a_panicking_transaction_does_not_kill_the_worker_thread() {
        let ls = Locksmith::new(1004);
        assert!(ls.transaction(&["a"], || -> i32 { panic!("boom") }).is_err());
        // The worker must still be alive to serve a subsequent call.
        assert_eq!(ls.transaction(&["a"], || 5).unwrap(), 5);
    }

    #[test]
    fn a_panicking_queued_execute_does_not_kill_the_worker_thread() {
        let ls = StdArc::new(Locksmith::new(1005));
        let table = LockTable::global();
        let held = crate::lock_table::next_owner_token();
        assert!(table.lock(1005, &[crate::lock_table::hash_key(&"k")], held));

        let ls2 = ls.clone();
        let handle = std::thread::spawn(move || ls2.execute(&"k", || -> i32 { panic!("boom") }));
        std::thread::sleep(std::time::Duration::from_millis(20));
        table.unlock(1005, &[crate::lock_table::hash_key(&"k")]);
        assert!(matches!(handle.join().unwrap(), Err(Failure::Panicked(_))));

        assert_eq!(ls.execute(&"k", || 9).unwrap(), 9);
    }
}
