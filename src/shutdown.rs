use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Tells long-lived connection tasks that the server is going away.
///
/// Each connection calls [`register`](Self::register) and keeps the returned
/// guard alive for its lifetime; the watch receiver flips to `true` once
/// [`shutdown`](Self::shutdown) is called so the task can send a close frame.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    tx: Arc<watch::Sender<bool>>,
    active: Arc<AtomicUsize>,
}

/// Decrements the active connection count on drop.
pub struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn register(&self) -> (ConnectionGuard, watch::Receiver<bool>) {
        self.active.fetch_add(1, Ordering::AcqRel);
        (
            ConnectionGuard {
                active: self.active.clone(),
            },
            self.tx.subscribe(),
        )
    }

    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.tx.borrow()
    }

    /// Connection tasks that have not finished yet.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_tracks_active_connections() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.active_count(), 0);

        let (guard1, _rx1) = coordinator.register();
        let (guard2, _rx2) = coordinator.register();
        assert_eq!(coordinator.active_count(), 2);

        drop(guard1);
        assert_eq!(coordinator.active_count(), 1);
        drop(guard2);
        assert_eq!(coordinator.active_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_notifies_registered_receivers() {
        let coordinator = ShutdownCoordinator::new();
        let (_guard, mut rx) = coordinator.register();
        assert!(!*rx.borrow());

        coordinator.shutdown();

        rx.changed().await.expect("sender alive");
        assert!(*rx.borrow());
        assert!(coordinator.is_shutting_down());
    }

    #[test]
    fn late_registrations_see_shutdown_state() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.shutdown();
        let (_guard, rx) = coordinator.register();
        assert!(*rx.borrow());
    }
}
