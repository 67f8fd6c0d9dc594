//! Durable, append-only event store.
//!
//! Events are written once and never updated. Appends go through a single
//! write gate so id uniqueness and write-before-publish ordering hold even
//! when several producers share one store; reads run concurrently and each
//! query sees a consistent view of the table.

use crate::entities::house_points::{
    CountHousePoints, HousePointRecord, InsertHousePoint, ListRecentHousePoints,
    SumHousePointsSince,
};
use crate::entities::{decode_timestamp, encode_timestamp};
use crate::framework::DatabaseProcessor;
use housecup_sdk::objects::{Category, HousePointEvent};
use kanau::processor::Processor;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../migrations");

/// Errors raised by the event store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An event with this id was already recorded. The store is unchanged.
    #[error("event {0} is already recorded")]
    DuplicateId(String),

    /// The database could not be reached or the statement failed.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// Schema migration failed while opening the store.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The event timestamp could not be encoded for storage.
    #[error("invalid event timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Append-only record of house point events.
///
/// Cheap to clone; clones share the pool and the write gate.
#[derive(Debug, Clone)]
pub struct EventStore {
    db: DatabaseProcessor,
    write_gate: Arc<Mutex<()>>,
}

impl EventStore {
    /// Open (creating if missing) the database at `url` and apply migrations.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        info!(%url, "Event store opened");
        Self::from_pool(pool).await
    }

    /// Open a private in-memory database.
    ///
    /// The pool holds exactly one connection that never expires, since every
    /// connection to `:memory:` would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying migrations first.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        MIGRATOR.run(&pool).await?;
        Ok(Self {
            db: DatabaseProcessor { pool },
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    /// Durably record `event`.
    ///
    /// Returns once the row is committed. A reused id is rejected with
    /// [`StoreError::DuplicateId`] and leaves the table untouched.
    pub async fn append(&self, event: &HousePointEvent) -> Result<(), StoreError> {
        let record = HousePointRecord::from_event(event)?;
        let _gate = self.write_gate.lock().await;
        match self.db.process(InsertHousePoint { record }).await {
            Ok(()) => {
                debug!(
                    id = %event.id,
                    category = %event.category,
                    points = event.points,
                    "Recorded event"
                );
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateId(event.id.clone())),
            Err(e) => Err(StoreError::Unavailable(e)),
        }
    }

    /// Sum points per category over events at or after `threshold`, or over
    /// every event when `threshold` is `None`.
    ///
    /// Categories without qualifying events are absent from the result.
    pub async fn sum_by_category_since(
        &self,
        threshold: Option<OffsetDateTime>,
    ) -> Result<BTreeMap<Category, i64>, StoreError> {
        let since = threshold.map(encode_timestamp).transpose()?;
        let rows = self.db.process(SumHousePointsSince { since }).await?;

        let mut sums = BTreeMap::new();
        for row in rows {
            match row.category.parse::<Category>() {
                Ok(category) => {
                    sums.insert(category, row.total);
                }
                Err(e) => warn!(error = %e, total = row.total, "Skipping unknown category"),
            }
        }
        Ok(sums)
    }

    /// Number of recorded events.
    pub async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.db.process(CountHousePoints).await?)
    }

    /// The `limit` most recent events, newest first.
    ///
    /// Rows that no longer decode (foreign category or timestamp layout) are
    /// skipped.
    pub async fn recent(&self, limit: i64) -> Result<Vec<HousePointEvent>, StoreError> {
        let records = self.db.process(ListRecentHousePoints { limit }).await?;
        Ok(records.into_iter().filter_map(decode_record).collect())
    }
}

fn decode_record(record: HousePointRecord) -> Option<HousePointEvent> {
    let category = match record.category.parse::<Category>() {
        Ok(category) => category,
        Err(e) => {
            warn!(id = %record.id, error = %e, "Skipping row with unknown category");
            return None;
        }
    };
    let timestamp = match decode_timestamp(&record.timestamp) {
        Ok(timestamp) => timestamp,
        Err(e) => {
            warn!(id = %record.id, error = %e, "Skipping row with unreadable timestamp");
            return None;
        }
    };
    Some(HousePointEvent {
        id: record.id,
        category,
        points: record.points,
        timestamp,
    })
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db_error| db_error.is_unique_violation())
}
