//! Target-time input parsing.
//!
//! Full date-times are tried before bare times, each list in a fixed order.
//! Values without an offset are civil time in the configured fixed offset; a
//! bare time means that time today in the same offset.

use crate::error::{Result, TsIndexError};
use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Parse `input` relative to the current date in `offset`.
pub fn parse_target_time(input: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    parse_target_time_at(input, offset, Utc::now())
}

/// Parse `input`, taking "today" from `now` as seen in `offset`.
pub fn parse_target_time_at(
    input: &str,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Result<DateTime<FixedOffset>> {
    let input = input.trim();

    if let Ok(explicit) = DateTime::parse_from_rfc3339(input) {
        return Ok(explicit.with_timezone(&offset));
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return civil(offset, naive, input);
        }
    }

    let today = now.with_timezone(&offset).date_naive();
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(input, format) {
            return civil(offset, today.and_time(time), input);
        }
    }

    Err(TsIndexError::TimeParse(format!(
        "Cannot parse time: {input:?} (expected YYYY-MM-DD HH:MM[:SS] or HH:MM[:SS])"
    )))
}

fn civil(offset: FixedOffset, naive: NaiveDateTime, input: &str) -> Result<DateTime<FixedOffset>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| TsIndexError::TimeParse(format!("{input:?} is out of range")))
}
