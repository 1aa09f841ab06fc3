//! Fixed-size worker pool fed by an unbounded queue.
//!
//! Each unit of work runs in its own task so a panic is contained and
//! reported to the submitter instead of taking a worker down.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one worker")]
    NoWorkers,
    #[error("worker pool is shut down")]
    Closed,
    #[error("unit of work panicked: {0}")]
    Panicked(String),
    #[error("unit of work was dropped before completing")]
    Lost,
}

#[derive(Default)]
struct Counters {
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl Counters {
    fn is_idle(&self) -> bool {
        self.queued.load(Ordering::SeqCst) == 0 && self.in_flight.load(Ordering::SeqCst) == 0
    }

    fn notify_if_idle(&self) {
        if self.is_idle() {
            self.idle.notify_waiters();
        }
    }
}

/// Completion handle for a submitted unit.
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, PoolError>>,
}

impl<T> TaskHandle<T> {
    pub async fn join(self) -> Result<T, PoolError> {
        self.rx.await.unwrap_or(Err(PoolError::Lost))
    }
}

pub struct WorkerPool {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawns `size` workers. Must be called from within a Tokio runtime.
    pub fn new(name: &str, size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let counters = Arc::new(Counters::default());

        let workers = (0..size)
            .map(|idx| {
                tokio::spawn(worker_loop(
                    name.to_string(),
                    idx,
                    rx.clone(),
                    counters.clone(),
                ))
            })
            .collect();
        debug!(pool = name, size, "worker pool started");

        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            counters,
        })
    }

    pub fn queued(&self) -> usize {
        self.counters.queued.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    pub fn submit<F, T>(&self, unit: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = tokio::spawn(unit).await.map_err(describe_join_error);
            let _ = tx.send(result);
        });

        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(PoolError::Closed)?;
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(job).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            self.counters.notify_if_idle();
            return Err(PoolError::Closed);
        }
        Ok(TaskHandle { rx })
    }

    /// Resolves once nothing is queued and nothing is running.
    pub async fn await_quiescence(&self) {
        loop {
            let notified = self.counters.idle.notified();
            if self.counters.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stops intake, lets the workers drain what is already queued, then
    /// joins them. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.close();
        let workers = {
            let mut guard = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        if workers.is_empty() {
            return;
        }
        for worker in workers {
            if let Err(err) = worker.await {
                warn!(pool = %self.name, error = %err, "worker exited abnormally");
            }
        }
        debug!(pool = %self.name, "worker pool stopped");
    }

    fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Teardown only stops intake. Workers keep draining what is already
/// queued and exit on their own, detached; call [`WorkerPool::shutdown`] to
/// join them.
impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

async fn worker_loop(
    pool: String,
    idx: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>>,
    counters: Arc<Counters>,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else { break };
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        counters.queued.fetch_sub(1, Ordering::SeqCst);
        job.await;
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        counters.notify_if_idle();
    }
    debug!(pool = %pool, worker = idx, "worker exiting");
}

fn describe_join_error(err: JoinError) -> PoolError {
    if err.is_panic() {
        PoolError::Panicked(panic_message(err.into_panic()))
    } else {
        PoolError::Lost
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        assert!(matches!(WorkerPool::new("t", 0), Err(PoolError::NoWorkers)));
    }

    #[tokio::test]
    async fn results_reach_the_submitter() {
        let pool = WorkerPool::new("t", 2).unwrap();
        let handles: Vec<_> = (0..10u32)
            .map(|i| pool.submit(async move { i * 2 }).unwrap())
            .collect();
        let mut sum = 0;
        for h in handles {
            sum += h.join().await.unwrap();
        }
        assert_eq!(sum, 90);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_is_bounded_by_pool_size() {
        let pool = WorkerPool::new("t", 3).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..12 {
            let running = running.clone();
            let peak = peak.clone();
            handles.push(
                pool.submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .unwrap(),
            );
        }
        pool.await_quiescence().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.queued(), 0);
        assert_eq!(pool.in_flight(), 0);
        for h in handles {
            h.join().await.unwrap();
        }
    }

    #[tokio::test]
    async fn panic_is_reported_and_pool_keeps_working() {
        let pool = WorkerPool::new("t", 1).unwrap();
        let bad = pool
            .submit(async {
                if true {
                    panic!("boom");
                }
            })
            .unwrap();
        let good = pool.submit(async { 7 }).unwrap();
        match bad.join().await {
            Err(PoolError::Panicked(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected a panic report, got {:?}", other),
        }
        assert_eq!(good.join().await.unwrap(), 7);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_then_rejects() {
        let pool = WorkerPool::new("t", 1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let done = done.clone();
            handles.push(
                pool.submit(async move {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap(),
            );
        }
        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert!(matches!(pool.submit(async {}), Err(PoolError::Closed)));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn dropped_pool_still_finishes_queued_units() {
        let pool = WorkerPool::new("t", 1).unwrap();
        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                pool.submit(async move {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    i
                })
                .unwrap()
            })
            .collect();
        drop(pool);
        let mut finished = Vec::new();
        for h in handles {
            finished.push(h.join().await.unwrap());
        }
        assert_eq!(finished, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn quiescence_on_idle_pool_returns_immediately() {
        let pool = WorkerPool::new("t", 2).unwrap();
        pool.await_quiescence().await;
    }
}
