use sqlx::SqlitePool;

/// Executes entity queries against the connection pool.
///
/// Each query is a plain request struct with a
/// [`Processor`](kanau::processor::Processor) impl on this type.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: SqlitePool,
}
