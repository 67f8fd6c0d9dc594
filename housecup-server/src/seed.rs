//! Fixed sample events for `--populate-test-data`.

use housecup_core::store::{EventStore, StoreError};
use housecup_sdk::objects::{Category, HousePointEvent};
use time::OffsetDateTime;

const SAMPLE_EVENTS: [(&str, Category, i64); 6] = [
    ("test_1", Category::Gryff, 50),
    ("test_2", Category::Slyth, 45),
    ("test_3", Category::Raven, 55),
    ("test_4", Category::Huff, 48),
    ("test_5", Category::Gryff, 52),
    ("test_6", Category::Slyth, 47),
];

/// Insert the sample events, stamped with the current time.
///
/// Samples already present are skipped. Returns how many were inserted.
pub async fn populate_test_data(store: &EventStore) -> Result<usize, StoreError> {
    let now = OffsetDateTime::now_utc();
    let mut inserted = 0;
    for (id, category, points) in SAMPLE_EVENTS {
        match store
            .append(&HousePointEvent::new(id, category, points, now))
            .await
        {
            Ok(()) => inserted += 1,
            Err(StoreError::DuplicateId(_)) => {
                tracing::debug!(%id, "Sample event already present");
            }
            Err(e) => return Err(e),
        }
    }
    tracing::info!(inserted, "Test data populated");
    Ok(inserted)
}
