pub mod house_points;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Fixed-width UTC layout used for the `timestamp` column.
///
/// Every stored value has the same width and offset, so lexical order of the
/// text equals chronological order and range filters can compare strings.
const STORED_TIMESTAMP: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
);

/// Encode an instant for storage, normalizing it to UTC.
pub fn encode_timestamp(instant: OffsetDateTime) -> Result<String, time::error::Format> {
    instant.to_offset(UtcOffset::UTC).format(STORED_TIMESTAMP)
}

/// Decode a stored timestamp.
pub fn decode_timestamp(stored: &str) -> Result<OffsetDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(stored, STORED_TIMESTAMP).map(PrimitiveDateTime::assume_utc)
}
