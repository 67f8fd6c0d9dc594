use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::category::Category;
use super::totals::AllWindowTotals;

/// A single points award.
///
/// Immutable once recorded; `id` is unique across all events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousePointEvent {
    pub id: String,
    pub category: Category,
    pub points: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl HousePointEvent {
    pub fn new(
        id: impl Into<String>,
        category: Category,
        points: i64,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            points,
            timestamp,
        }
    }
}

/// Payload pushed to every live subscriber after an event is recorded.
///
/// ```json
/// {"event":{"id":"...","category":"Gryff","points":10,"timestamp":"..."},
///  "totals":{"short":{...},"medium":{...},"unbounded":{...}}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUpdate {
    pub event: HousePointEvent,
    pub totals: AllWindowTotals,
}
