//! Bounded FIFO between the HTTP handlers and the executor.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::job::Job;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("job queue is full")]
    Full(Box<Job>),
    #[error("job queue is closed")]
    Closed(Box<Job>),
}

/// Create a queue holding at most `capacity` jobs (at least one).
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (JobSender { tx }, JobReceiver { rx })
}

/// Producer half, cloned into every endpoint handler.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::Sender<Job>,
}

impl JobSender {
    /// Enqueue without waiting. A full queue hands the job back.
    pub fn submit(&self, job: Job) -> Result<(), SubmitError> {
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) => SubmitError::Full(Box::new(job)),
            TrySendError::Closed(job) => SubmitError::Closed(Box::new(job)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Number of jobs waiting to be picked up.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Consumer half, owned by the single executor.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<Job>,
}

impl JobReceiver {
    /// Wait for the next job. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Job> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Job> {
        self.rx.try_recv().ok()
    }
}
