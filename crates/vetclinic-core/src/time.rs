//! Interpreting client-supplied booking dates.
//!
//! Clients send ISO-8601-like strings. A string carrying its own offset is
//! taken at face value; a bare local date-time is read as civil time in the
//! clinic's zone.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone as _, Utc};
use chrono_tz::Tz;

use crate::{Error, Result};

const NAIVE_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M%#z"];

/// Parse `input` into an absolute instant, reading offset-less values in
/// `zone`. Fails with `InvalidInput` on anything unparseable, and on local
/// times skipped by a DST transition. Ambiguous local times resolve to the
/// earlier instant.
pub fn parse_booking_date(input: &str, zone: Tz) -> Result<DateTime<Utc>> {
  let s = input.trim();
  let invalid = || Error::invalid(format!("invalid date format: {input:?}"));

  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  for fmt in OFFSET_FORMATS {
    if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
      return Ok(dt.with_timezone(&Utc));
    }
  }

  let naive = NAIVE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .or_else(|| {
      NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
    .ok_or_else(invalid)?;

  zone
    .from_local_datetime(&naive)
    .earliest()
    .map(|dt| dt.with_timezone(&Utc))
    .ok_or_else(invalid)
}

/// Render `at` as local civil time in `zone`, for human-facing messages.
pub fn format_local(at: DateTime<Utc>, zone: Tz) -> String {
  at.with_timezone(&zone).format("%d/%m/%Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  const TUNIS: Tz = chrono_tz::Africa::Tunis;

  #[test]
  fn local_time_is_read_in_the_clinic_zone() {
    // Tunis is UTC+1 all year.
    let got = parse_booking_date("2025-03-01T10:00", TUNIS).unwrap();
    assert_eq!(got, Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());

    let with_secs = parse_booking_date("2025-03-01T10:00:00.000", TUNIS).unwrap();
    assert_eq!(with_secs, got);
  }

  #[test]
  fn explicit_offsets_win() {
    let z = parse_booking_date("2025-03-01T10:00:00Z", TUNIS).unwrap();
    assert_eq!(z, Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap());

    let plus2 = parse_booking_date("2025-03-01T10:00+02:00", TUNIS).unwrap();
    assert_eq!(plus2, Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap());
  }

  #[test]
  fn bare_dates_mean_local_midnight() {
    let got = parse_booking_date("2025-03-01", TUNIS).unwrap();
    assert_eq!(got, Utc.with_ymd_and_hms(2025, 2, 28, 23, 0, 0).unwrap());
  }

  #[test]
  fn garbage_is_invalid_input() {
    for bad in ["", "tomorrow", "2025-13-01T10:00", "01/03/2025"] {
      let err = parse_booking_date(bad, TUNIS).unwrap_err();
      assert!(matches!(err, Error::InvalidInput(_)), "{bad:?}: {err:?}");
    }
  }

  #[test]
  fn skipped_local_time_is_rejected() {
    // 2025-03-30 02:30 does not exist in Paris.
    let err =
      parse_booking_date("2025-03-30T02:30", chrono_tz::Europe::Paris).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[test]
  fn formats_in_local_time() {
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    assert_eq!(format_local(at, TUNIS), "01/03/2025 10:00");
  }
}
