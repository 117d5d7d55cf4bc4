// src/cancel.rs

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ReconError;

/// Cooperative cancellation signal shared between a caller and in-flight requests.
///
/// Cloning is cheap; every clone observes the same signal.
#[derive(Clone, Debug)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Sender lives as long as any token clone, so this only happens on teardown.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Runs `fut` unless the token fires first, in which case the future is dropped
    /// (aborting any in-flight network call) and `ReconError::Cancelled` is returned.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ReconError>
    where
        F: Future<Output = Result<T, ReconError>>,
    {
        if self.is_cancelled() {
            return Err(ReconError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ReconError::Cancelled),
            result = fut => result,
        }
    }
}

/// Monotonic ticket counter for one logical query. A caller takes a ticket before
/// issuing a request and drops the response if a newer ticket was issued meanwhile.
#[derive(Debug, Default)]
pub struct QueryTicket {
    latest: AtomicU64,
}

impl QueryTicket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}
