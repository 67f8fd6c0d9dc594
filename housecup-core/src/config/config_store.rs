//! Shared config value with change notification.
//!
//! Lets the server swap a value at runtime (for instance on SIGHUP) while
//! long-running loops pick the new value up on their next iteration, or wake
//! early through a [`ConfigWatcher`].

use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, watch};

/// A shared configuration value. Clones see the same value.
pub struct ConfigStore<T> {
    inner: Arc<Shared<T>>,
}

struct Shared<T> {
    value: RwLock<T>,
    changed_tx: watch::Sender<()>,
}

/// Receives notifications when a [`ConfigStore`] is updated.
pub struct ConfigWatcher {
    changed_rx: watch::Receiver<()>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (changed_tx, _) = watch::channel(());
        Self {
            inner: Arc::new(Shared {
                value: RwLock::new(initial),
                changed_tx,
            }),
        }
    }

    /// Replace the stored value and wake every watcher.
    pub async fn update(&self, value: T) {
        *self.inner.value.write().await = value;
        // Notify after the write lock is released.
        self.inner.changed_tx.send_replace(());
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.value.read().await
    }

    /// A watcher that fires on every update made after this call.
    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            changed_rx: self.inner.changed_tx.subscribe(),
        }
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConfigWatcher {
    /// Wait until the store is updated.
    ///
    /// Returns `Err` once the [`ConfigStore`] has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.changed_rx.changed().await
    }
}
