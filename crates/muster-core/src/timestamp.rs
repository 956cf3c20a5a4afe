//! The source's date and time notations.
//!
//! All three are US month-first forms with unpadded components:
//!
//! | Where                   | Form                          |
//! |-------------------------|-------------------------------|
//! | movement log, join date | `M-d-yyyy`                    |
//! | attendee rows           | `M-d-yyyy H:mm` (UTC)         |
//! | event `When` field      | `M/d/yyyy H:mm:ss zzz`        |

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::{Error, Result};

const MONTH_DAY_YEAR: &str = "%m-%d-%Y";
const ATTENDANCE_TIME: &str = "%m-%d-%Y %H:%M";
const US_TIME: &str = "%m.%d.%Y %H:%M:%S %:z";

/// `10-3-2014` → 2014-10-03.
pub fn parse_month_day_year(value: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(value.trim(), MONTH_DAY_YEAR).map_err(|_| {
    Error::InvalidTimestamp { value: value.to_string(), format: "M-d-yyyy" }
  })
}

/// A `M-d-yyyy` date taken as midnight UTC.
pub fn parse_month_day_year_utc(value: &str) -> Result<DateTime<Utc>> {
  Ok(parse_month_day_year(value)?.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Attendee row timestamp, recorded in UTC. The hour is read on a 24-hour
/// clock, which also covers the source's 12-hour `hh` values.
pub fn parse_attendance_time(value: &str) -> Result<DateTime<Utc>> {
  NaiveDateTime::parse_from_str(value.trim(), ATTENDANCE_TIME)
    .map(|dt| dt.and_utc())
    .map_err(|_| Error::InvalidTimestamp {
      value:  value.to_string(),
      format: "M-d-yyyy H:mm",
    })
}

/// Event time with an explicit offset. `/` and `.` separate the date parts
/// interchangeably.
pub fn parse_us_time(value: &str) -> Result<DateTime<Utc>> {
  let normalised = value.trim().replace('/', ".");
  DateTime::parse_from_str(&normalised, US_TIME)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| Error::InvalidTimestamp {
      value:  value.to_string(),
      format: "M/d/yyyy H:mm:ss zzz",
    })
}

/// Split an event `When` value, `From: <start> to: <end>`, into its two
/// halves. Labels are matched case-insensitively; either half may be absent.
pub fn split_when(value: &str) -> (Option<&str>, Option<&str>) {
  let lower = value.to_ascii_lowercase();
  let from = lower.find("from:").map(|i| i + "from:".len());
  let to = lower.find("to:");

  let start = match (from, to) {
    (Some(f), Some(t)) if t >= f => Some(&value[f..t]),
    (Some(f), None) => Some(&value[f..]),
    _ => None,
  };
  let end = to.map(|t| &value[t + "to:".len()..]);

  fn clean(s: &str) -> Option<&str> {
    Some(s.trim()).filter(|s| !s.is_empty())
  }
  (start.and_then(clean), end.and_then(clean))
}
