use async_trait::async_trait;
use housecup_sdk::objects::{Category, HousePointEvent};
use rand::Rng;
use rand::seq::IndexedRandom;
use time::OffsetDateTime;

/// Supplies the events recorded by the producer.
///
/// Returning `None` means the source is exhausted; the emission loop then
/// ends as if stopped.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn next_event(&self) -> Option<HousePointEvent>;
}

/// Synthesizes events: uniform category, 1 to 100 points, fresh UUID v4,
/// current UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomEventSource;

impl RandomEventSource {
    pub const MIN_POINTS: i64 = 1;
    pub const MAX_POINTS: i64 = 100;

    pub fn generate(&self) -> HousePointEvent {
        let mut rng = rand::rng();
        let category = Category::ALL
            .choose(&mut rng)
            .copied()
            .unwrap_or(Category::Gryff);
        let points = rng.random_range(Self::MIN_POINTS..=Self::MAX_POINTS);
        HousePointEvent::new(
            uuid::Uuid::new_v4().to_string(),
            category,
            points,
            OffsetDateTime::now_utc(),
        )
    }
}

#[async_trait]
impl EventSource for RandomEventSource {
    async fn next_event(&self) -> Option<HousePointEvent> {
        Some(self.generate())
    }
}
