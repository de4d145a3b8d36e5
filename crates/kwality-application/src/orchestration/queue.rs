//! Bounded FIFO of admitted jobs.
//!
//! `try_enqueue` never blocks: at capacity it returns `QueueFull`
//! immediately, which the submission path surfaces as a synchronous
//! rejection. Workers take with blocking semantics that yield to the
//! shutdown signal.

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use kwality_domain::entities::Job;
use kwality_domain::error::{Error, Result};

/// A job admitted to the queue together with its cancellation token.
#[derive(Debug)]
pub struct QueuedJob {
    /// The admitted job, still in `Pending`
    pub job: Job,
    /// Job-scoped cancellation token; engines get child tokens
    pub cancel: CancellationToken,
}

/// Multi-producer multi-consumer bounded FIFO.
pub struct JobQueue {
    tx: mpsc::Sender<QueuedJob>,
    rx: Mutex<mpsc::Receiver<QueuedJob>>,
    capacity: usize,
}

impl JobQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }

    /// Capacity the queue was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs currently waiting.
    pub fn pending(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    /// Admit a job without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`] when `pending == capacity`, or
    /// `Internal` if the queue has been torn down.
    pub fn try_enqueue(&self, queued: QueuedJob) -> Result<()> {
        self.tx.try_send(queued).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::QueueFull,
            mpsc::error::TrySendError::Closed(_) => {
                Error::internal("job queue is closed")
            }
        })
    }

    /// Take the next job in FIFO order, waiting until one is available.
    ///
    /// Returns `None` when `shutdown` fires, so workers can drain out.
    pub async fn dequeue(&self, shutdown: &CancellationToken) -> Option<QueuedJob> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            () = shutdown.cancelled() => None,
            queued = rx.recv() => queued,
        }
    }
}
