//! Packed device timestamps.
//!
//! The wire encodes the terminal's local wall-clock as a single u32 counting
//! from 2000-01-01 on a calendar with every month fixed at 31 days:
//!
//! ```text
//! sec   = t % 60;       t /= 60
//! min   = t % 60;       t /= 60
//! hour  = t % 24;       t /= 24
//! day   = (t % 31) + 1; t /= 31
//! month = (t % 12) + 1; t /= 12      (stored 0-based)
//! year  = t + 2000
//! ```
//!
//! Because months are fixed at 31 days, some packed values name days that do
//! not exist (for example February 30); those decode to `None` and the
//! surrounding record is dropped.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Decode a packed u32 into a naive wall-clock value.
///
/// Returns `None` when the packed fields name an impossible calendar date.
pub fn decode_timestamp(mut t: u32) -> Option<NaiveDateTime> {
    let sec = t % 60;
    t /= 60;
    let min = t % 60;
    t /= 60;
    let hour = t % 24;
    t /= 24;
    let day = (t % 31) + 1;
    t /= 31;
    let month = (t % 12) + 1;
    t /= 12;
    let year = 2000 + t;

    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?.and_hms_opt(hour, min, sec)
}

/// Encode a naive wall-clock value into the packed u32 form.
///
/// Inverse of [`decode_timestamp`]. Years before 2000 clamp to 2000; the
/// store never holds such values.
pub fn encode_timestamp(dt: &NaiveDateTime) -> u32 {
    let year = u32::try_from(dt.year() - 2000).unwrap_or(0);
    let days = (year * 12 + (dt.month() - 1)) * 31 + (dt.day() - 1);
    ((days * 24 + dt.hour()) * 60 + dt.minute()) * 60 + dt.second()
}
