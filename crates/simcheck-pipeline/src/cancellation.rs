use std::sync::Arc;

use tokio::sync::watch;

/// A cooperative, clonable cancel signal for one analysis run.
///
/// `tokio_util::sync::CancellationToken` would be the obvious choice,
/// but it's not part of this workspace's dependency set; a `watch`
/// channel gives the same "clone freely, cancel once, every holder
/// observes it" shape with what's already in `tokio::sync`.
#[derive(Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel()` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let c = Cancellation::new();
        let c2 = c.clone();
        let handle = tokio::spawn(async move {
            c2.cancelled().await;
        });
        assert!(!c.is_cancelled());
        c.cancel();
        handle.await.unwrap();
        assert!(c.is_cancelled());
    }
}
