use crate::config::StreamConfig;
use crate::processors::EventSource;
use crate::store::EventStore;
use async_trait::async_trait;
use housecup_sdk::objects::{Category, HousePointEvent};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use time::OffsetDateTime;

pub async fn memory_store() -> EventStore {
    EventStore::in_memory().await.unwrap()
}

pub fn event_at(id: &str, category: Category, points: i64, at: OffsetDateTime) -> HousePointEvent {
    HousePointEvent::new(id, category, points, at)
}

pub fn fast_config() -> StreamConfig {
    StreamConfig::new(Duration::from_millis(1), Duration::from_millis(1)).unwrap()
}

/// Yields a fixed list of events, then reports exhaustion.
pub struct ScriptedSource {
    events: Mutex<VecDeque<HousePointEvent>>,
}

impl ScriptedSource {
    pub fn new(events: impl IntoIterator<Item = HousePointEvent>) -> Self {
        Self {
            events: Mutex::new(events.into_iter().collect()),
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn next_event(&self) -> Option<HousePointEvent> {
        self.events.lock().unwrap().pop_front()
    }
}

/// Endless source that records how many `next_event` calls overlap.
///
/// Each call holds for `hold`, so two concurrent emission loops would be
/// seen as two calls in flight.
pub struct GaugeSource {
    hold: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    issued: AtomicU64,
}

impl GaugeSource {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            issued: AtomicU64::new(0),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for GaugeSource {
    async fn next_event(&self) -> Option<HousePointEvent> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        // Released on drop too, since a cancelled loop drops this future.
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;

        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Some(HousePointEvent::new(
            format!("gauge-{n}"),
            Category::ALL[(n % 4) as usize],
            1,
            OffsetDateTime::now_utc(),
        ))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
