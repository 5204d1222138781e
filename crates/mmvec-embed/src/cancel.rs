use std::sync::Arc;
use tokio::sync::watch;

/// Owner side of a cancellation signal. Dropping it without calling
/// `cancel` also counts as cancellation for outstanding listeners.
pub struct CancellationHandle {
    sender: watch::Sender<bool>,
}

/// A clonable view used by waiters to observe cancellation.
#[derive(Clone, Debug)]
pub struct CancellationListener {
    receiver: Arc<watch::Receiver<bool>>,
    // Only set for `never()`, which owns its sender.
    _sender: Option<Arc<watch::Sender<bool>>>,
}

/// Create a linked handle/listener pair.
pub fn cancellation() -> (CancellationHandle, CancellationListener) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle { sender: tx }, CancellationListener { receiver: Arc::new(rx), _sender: None })
}

impl CancellationHandle {
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }

    pub fn listener(&self) -> CancellationListener {
        CancellationListener { receiver: Arc::new(self.sender.subscribe()), _sender: None }
    }
}

impl CancellationListener {
    /// A listener that is never cancelled.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { receiver: Arc::new(rx), _sender: Some(Arc::new(tx)) }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested or the handle is dropped.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.as_ref().clone();
        while !*receiver.borrow() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}
