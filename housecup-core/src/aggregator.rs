//! Windowed totals computed from the event store.

use crate::store::{EventStore, StoreError};
use housecup_sdk::objects::{AllWindowTotals, Window, WindowTotals};
use time::OffsetDateTime;

/// Computes per-category totals over the short, medium and unbounded windows.
///
/// Holds no state of its own; every call reads the store, so totals reflect
/// every event appended before the call began.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    store: EventStore,
}

impl WindowAggregator {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Totals for every window, evaluated against the current instant.
    pub async fn snapshot(&self) -> Result<AllWindowTotals, StoreError> {
        self.snapshot_at(OffsetDateTime::now_utc()).await
    }

    /// Totals for every window, evaluated against `now`.
    ///
    /// All three windows share the one `now`. Narrower windows are read first,
    /// so a concurrent append can only make a wider window larger and
    /// `short <= medium <= unbounded` holds per category.
    #[tracing::instrument(skip(self), err)]
    pub async fn snapshot_at(&self, now: OffsetDateTime) -> Result<AllWindowTotals, StoreError> {
        let short = self.snapshot_window_at(Window::Short, now).await?;
        let medium = self.snapshot_window_at(Window::Medium, now).await?;
        let unbounded = self.snapshot_window_at(Window::Unbounded, now).await?;
        Ok(AllWindowTotals {
            short,
            medium,
            unbounded,
        })
    }

    /// Totals for a single window, evaluated against the current instant.
    pub async fn snapshot_window(&self, window: Window) -> Result<WindowTotals, StoreError> {
        self.snapshot_window_at(window, OffsetDateTime::now_utc())
            .await
    }

    /// Totals for a single window, evaluated against `now`. Every category is
    /// present; those without qualifying events report zero.
    pub async fn snapshot_window_at(
        &self,
        window: Window,
        now: OffsetDateTime,
    ) -> Result<WindowTotals, StoreError> {
        let sums = self
            .store
            .sum_by_category_since(window.threshold(now))
            .await?;
        Ok(WindowTotals::from_sums(sums))
    }
}
