//! Worker-pool backend.

use super::{resolve, Backend, DeliveryThread, Primitives, SystemPrimitives};
use crate::{
    cancel::CancelToken,
    config::PoolConfig,
    request::{Dispatch, Request},
    Error,
};
use parking_lot::{Condvar, Mutex};
use std::{
    collections::VecDeque,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

/// Backend running each request's blocking primitive on a bounded pool of
/// reusable worker threads fed by an unbounded FIFO queue.
///
/// Workers are spawned on demand up to the configured maximum and exit after
/// sitting idle for a while. Completion callbacks run on a separate
/// [`DeliveryThread`], so they may issue further lookups. Cancelling a request whose primitive is already running does not stop the
/// call; the request reports [`Error::Cancelled`] right away and the worker's
/// late completion is discarded.
pub struct WorkerPool {
    shared: Arc<Shared>,
    delivery: Arc<DeliveryThread>,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    primitives: Arc<dyn Primitives>,
    max_workers: usize,
    idle_timeout: Duration,
}

#[derive(Default)]
struct Queue {
    jobs: VecDeque<Arc<Request>>,
    workers: usize,
    idle: usize,
    spawned: usize,
    shutdown: bool,
}

impl WorkerPool {
    /// Creates a pool running `primitives`.
    pub fn new(config: &PoolConfig, primitives: Arc<dyn Primitives>) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            available: Condvar::new(),
            primitives,
            max_workers: config.max_workers,
            idle_timeout: config.idle_timeout,
        });
        let delivery = Arc::new(DeliveryThread::new(config.idle_timeout));
        Self { shared, delivery }
    }

    /// Creates a pool running the [`SystemPrimitives`].
    pub fn with_system_primitives(config: PoolConfig) -> Self {
        let primitives = Arc::new(SystemPrimitives::new(config.clone()));
        Self::new(&config, primitives)
    }

    /// Gets the number of live worker threads.
    pub fn workers(&self) -> usize {
        self.shared.queue.lock().workers
    }

    /// Gets the number of jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }
}

impl Backend for WorkerPool {
    fn submit(&self, request: Arc<Request>, cancel: Option<&CancelToken>) {
        #[cfg(feature = "log")]
        tracing::debug!(request = request.id(), query = %request.query(), "submitting request");
        if let Some(token) = cancel {
            request.watch(token);
        }
        Shared::push(&self.shared, request);
    }

    fn dispatcher(&self) -> Arc<dyn Dispatch> {
        self.delivery.clone()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers finish the queued jobs, then exit
        self.shared.queue.lock().shutdown = true;
        self.shared.available.notify_all();
        self.delivery.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.queue.lock();
        f.debug_struct("WorkerPool")
            .field("max_workers", &self.shared.max_workers)
            .field("workers", &queue.workers)
            .field("idle", &queue.idle)
            .field("queued", &queue.jobs.len())
            .finish()
    }
}

impl Shared {
    fn push(this: &Arc<Self>, request: Arc<Request>) {
        let spawn = {
            let mut queue = this.queue.lock();
            queue.jobs.push_back(request);
            let spawn = queue.jobs.len() > queue.idle && queue.workers < this.max_workers;
            if spawn {
                queue.workers += 1;
                queue.spawned += 1;
                Some(queue.spawned)
            } else {
                None
            }
        };

        match spawn {
            Some(n) => Self::spawn_worker(this, n),
            None => {
                this.available.notify_one();
            }
        }
    }

    fn spawn_worker(this: &Arc<Self>, n: usize) {
        let shared = this.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("resolv-worker-{}", n))
            .spawn(move || shared.work());
        let err = match spawned {
            Ok(_) => return,
            Err(err) => err,
        };

        #[cfg(feature = "log")]
        tracing::warn!(error = %err, "unable to spawn resolver worker");
        let orphaned = {
            let mut queue = this.queue.lock();
            queue.workers -= 1;
            if queue.workers == 0 {
                std::mem::take(&mut queue.jobs)
            } else {
                VecDeque::new()
            }
        };
        // With no worker left nothing else would ever run these requests
        for request in orphaned {
            request.complete(Err(Error::internal(format!(
                "unable to spawn resolver thread: {}",
                err
            ))));
        }
    }

    fn work(&self) {
        #[cfg(feature = "log")]
        tracing::trace!("resolver worker started");
        while let Some(request) = self.next_job() {
            self.run(&request);
        }
        #[cfg(feature = "log")]
        tracing::trace!("resolver worker exiting");
    }

    /// Waits for the next job. Returns `None`, having deregistered the worker,
    /// once the pool is shut down or the worker idled for too long.
    fn next_job(&self) -> Option<Arc<Request>> {
        let mut queue = self.queue.lock();
        loop {
            if let Some(job) = queue.jobs.pop_front() {
                return Some(job);
            }
            if queue.shutdown {
                break;
            }
            queue.idle += 1;
            let timed_out = self
                .available
                .wait_for(&mut queue, self.idle_timeout)
                .timed_out();
            queue.idle -= 1;
            if timed_out && queue.jobs.is_empty() {
                break;
            }
        }
        queue.workers -= 1;
        None
    }

    fn run(&self, request: &Arc<Request>) {
        if request.is_completed() {
            #[cfg(feature = "log")]
            tracing::debug!(request = request.id(), "request completed before it ran, skipping");
            return;
        }

        let primitives = &*self.primitives;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| resolve(request.query(), primitives)))
            .unwrap_or_else(|_| Err(Error::internal("resolver primitive panicked")));

        #[cfg(feature = "log")]
        match &outcome {
            Ok(_) => tracing::debug!(request = request.id(), query = %request.query(), "resolved"),
            Err(e) => {
                tracing::debug!(request = request.id(), query = %request.query(), error = %e, "resolution failed")
            }
        }

        if !request.complete(outcome) {
            #[cfg(feature = "log")]
            tracing::debug!(request = request.id(), "discarding outcome of cancelled request");
        }
    }
}
