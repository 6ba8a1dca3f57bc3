//! Conversions between the on-disk nanosecond timestamp representation and [`jiff::Timestamp`].

use crate::sentinel::UNDEF_TIMESTAMP;
use jiff::Timestamp;

/// Converts nanoseconds-since-Unix-epoch to a [`Timestamp`].
///
/// Returns `None` if `ts` is the undefined-timestamp sentinel or falls outside the range
/// `jiff` can represent.
pub fn ts_to_datetime(ts: i64) -> Option<Timestamp> {
    if ts == UNDEF_TIMESTAMP {
        return None;
    }
    let secs = ts.div_euclid(1_000_000_000);
    let nanos = ts.rem_euclid(1_000_000_000) as i32;
    Timestamp::new(secs, nanos).ok()
}

/// Converts a [`Timestamp`] to nanoseconds-since-Unix-epoch.
///
/// Saturates to the undefined-timestamp sentinel if the value does not fit in `i64`
/// nanoseconds (this can only happen for timestamps far outside the range the Format is used
/// for, since `i64` nanoseconds already spans roughly the years 1677-2262).
pub fn datetime_to_ts(dt: Timestamp) -> i64 {
    i64::try_from(dt.as_nanosecond()).unwrap_or(UNDEF_TIMESTAMP)
}
