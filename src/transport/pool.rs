//! Worker pool executing transport jobs on dedicated OS threads.
//!
//! HTTP requests block, so they must never run on `may` coroutine workers.
//! Jobs are queued on an unbounded `may` channel, which works from both
//! coroutine and thread context, and picked up by whichever worker is idle.

use may::sync::mpsc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Unit of work handed to a worker thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Counters for a transport pool
#[derive(Debug, Default)]
pub struct TransportPoolMetrics {
    /// Current queue depth (approximate)
    pub queue_depth: AtomicUsize,
    /// Total jobs submitted
    pub dispatched_count: AtomicU64,
    /// Total jobs finished (including ones that panicked)
    pub completed_count: AtomicU64,
}

impl TransportPoolMetrics {
    pub fn record_dispatch(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get_queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }
}

/// Fixed set of worker threads sharing one job queue.
pub struct TransportPool {
    sender: mpsc::Sender<Job>,
    metrics: Arc<TransportPoolMetrics>,
    workers: usize,
}

impl TransportPool {
    /// Start `workers` threads (at least one) named `{name}-{n}`.
    #[must_use]
    pub fn new(name: &str, workers: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(rx);
        let metrics = Arc::new(TransportPoolMetrics::default());

        info!(pool = %name, workers = workers, "Starting transport pool");

        let mut started = 0;
        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            let metrics = Arc::clone(&metrics);
            let thread_name = format!("{name}-{worker_id}");

            let spawn_result = std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    debug!(worker = %thread_name, "Transport worker started");
                    // All workers share the receiver; recv fails once the pool is dropped
                    while let Ok(job) = rx.recv() {
                        if let Err(panic) =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(job))
                        {
                            error!(
                                worker = %thread_name,
                                panic_message = ?panic,
                                "Transport job panicked"
                            );
                        }
                        metrics.record_completion();
                    }
                    debug!(worker = %thread_name, "Transport worker exiting");
                });

            match spawn_result {
                Ok(_) => started += 1,
                Err(e) => error!(
                    pool = %name,
                    worker_id = worker_id,
                    error = %e,
                    "Failed to spawn transport worker"
                ),
            }
        }

        Self {
            sender: tx,
            metrics,
            workers: started,
        }
    }

    /// Queue a job. Hands the job back if no worker is left to run it.
    pub fn submit(&self, job: Job) -> Result<(), Job> {
        if self.workers == 0 {
            return Err(job);
        }
        self.metrics.record_dispatch();
        self.sender.send(job).map_err(|e| {
            self.metrics.record_completion();
            e.0
        })
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<TransportPoolMetrics> {
        &self.metrics
    }

    /// Number of workers that actually started
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_metrics_counters() {
        let metrics = TransportPoolMetrics::default();
        metrics.record_dispatch();
        assert_eq!(metrics.get_dispatched_count(), 1);
        assert_eq!(metrics.get_queue_depth(), 1);
        metrics.record_completion();
        assert_eq!(metrics.get_completed_count(), 1);
        assert_eq!(metrics.get_queue_depth(), 0);
    }

    #[test]
    fn test_jobs_run_and_survive_panics() {
        let pool = TransportPool::new("test-pool", 2);
        assert_eq!(pool.workers(), 2);
        let (tx, rx) = std::sync::mpsc::channel();

        assert!(pool.submit(Box::new(|| panic!("boom"))).is_ok());
        for i in 0..4 {
            let tx = tx.clone();
            assert!(pool
                .submit(Box::new(move || {
                    let _ = tx.send(i);
                }))
                .is_ok());
        }

        let mut seen: Vec<i32> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).expect("job ran"))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);

        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.metrics().get_completed_count() < 5 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.metrics().get_completed_count(), 5);
    }
}
