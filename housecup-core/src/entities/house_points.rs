use crate::framework::DatabaseProcessor;
use housecup_sdk::objects::HousePointEvent;
use kanau::processor::Processor;

/// One row of the `house_points` table.
///
/// `category` and `timestamp` are kept as stored text; conversion to the
/// typed event happens at the store boundary.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct HousePointRecord {
    pub id: String,
    pub category: String,
    pub points: i64,
    pub timestamp: String,
}

impl HousePointRecord {
    pub fn from_event(event: &HousePointEvent) -> Result<Self, time::error::Format> {
        Ok(Self {
            id: event.id.clone(),
            category: event.category.code().to_owned(),
            points: event.points,
            timestamp: super::encode_timestamp(event.timestamp)?,
        })
    }
}

/// Summed points of one category.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CategorySum {
    pub category: String,
    pub total: i64,
}

#[derive(Debug, Clone)]
/// Insert a single event row.
///
/// Fails with a unique-violation database error if the id already exists;
/// rows are never overwritten.
pub struct InsertHousePoint {
    pub record: HousePointRecord,
}

impl Processor<InsertHousePoint> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertHousePoint")]
    async fn process(&self, insert: InsertHousePoint) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO house_points (id, category, points, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(insert.record.id)
        .bind(insert.record.category)
        .bind(insert.record.points)
        .bind(insert.record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Sum points per category for events at or after `since`.
///
/// `since` is an encoded timestamp; `None` sums every row.
pub struct SumHousePointsSince {
    pub since: Option<String>,
}

impl Processor<SumHousePointsSince> for DatabaseProcessor {
    type Output = Vec<CategorySum>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SumHousePointsSince")]
    async fn process(&self, query: SumHousePointsSince) -> Result<Vec<CategorySum>, sqlx::Error> {
        let sums = match query.since {
            Some(since) => {
                sqlx::query_as::<_, CategorySum>(
                    r#"
                    SELECT category, SUM(points) AS total
                    FROM house_points
                    WHERE timestamp >= ?
                    GROUP BY category
                    "#,
                )
                .bind(since)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CategorySum>(
                    r#"
                    SELECT category, SUM(points) AS total
                    FROM house_points
                    GROUP BY category
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(sums)
    }
}

#[derive(Debug, Clone)]
/// Count all recorded events.
pub struct CountHousePoints;

impl Processor<CountHousePoints> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountHousePoints")]
    async fn process(&self, _query: CountHousePoints) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM house_points")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[derive(Debug, Clone)]
/// List the most recent events, newest first.
pub struct ListRecentHousePoints {
    pub limit: i64,
}

impl Processor<ListRecentHousePoints> for DatabaseProcessor {
    type Output = Vec<HousePointRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListRecentHousePoints")]
    async fn process(
        &self,
        query: ListRecentHousePoints,
    ) -> Result<Vec<HousePointRecord>, sqlx::Error> {
        let records = sqlx::query_as::<_, HousePointRecord>(
            r#"
            SELECT id, category, points, timestamp
            FROM house_points
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
