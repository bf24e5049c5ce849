//! Date-of-birth normalisation.
//!
//! Dates arrive either as `day/month/year` tokens (as printed on identity
//! documents and returned by the verification gateway) or as ISO-like strings
//! typed by the user. Both collapse into a single [`NaiveDate`].

use chrono::{DateTime, NaiveDate};

use crate::{Error, Result};

/// Parse `raw` into a calendar date.
///
/// Accepted forms:
/// - `DD/MM/YYYY` (one- or two-digit day and month, four-digit year)
/// - `YYYY-MM-DD`
/// - an RFC 3339 timestamp, of which only the date part is kept
///
/// Anything else, including impossible dates like `31/02/2001`, is an
/// [`Error::InvalidDate`].
pub fn normalize_dob(raw: &str) -> Result<NaiveDate> {
  let trimmed = raw.trim();
  let invalid = || Error::InvalidDate(raw.to_owned());

  if trimmed.contains('/') {
    return parse_day_month_year(trimmed).ok_or_else(invalid);
  }

  if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
    return Ok(date);
  }

  DateTime::parse_from_rfc3339(trimmed)
    .map(|dt| dt.date_naive())
    .map_err(|_| invalid())
}

fn parse_day_month_year(s: &str) -> Option<NaiveDate> {
  let mut parts = s.split('/');
  let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
  if parts.next().is_some() {
    return None;
  }

  // Two-digit years are ambiguous across centuries.
  if year.len() != 4 || day.is_empty() || day.len() > 2 || month.is_empty() || month.len() > 2 {
    return None;
  }
  let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
  if !(all_digits(day) && all_digits(month) && all_digits(year)) {
    return None;
  }

  NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

  #[test]
  fn slash_and_iso_forms_agree() {
    let a = normalize_dob("15/06/1990").unwrap();
    let b = normalize_dob("1990-06-15").unwrap();
    assert_eq!(a, b);
    assert_eq!(a, date(1990, 6, 15));
  }

  #[test]
  fn rfc3339_keeps_date_part() {
    assert_eq!(normalize_dob("1990-06-15T00:00:00Z").unwrap(), date(1990, 6, 15));
  }

  #[test]
  fn single_digit_day_and_month() {
    assert_eq!(normalize_dob("5/6/1990").unwrap(), date(1990, 6, 5));
  }

  #[test]
  fn surrounding_whitespace_is_ignored() {
    assert_eq!(normalize_dob("  15/06/1990 ").unwrap(), date(1990, 6, 15));
  }

  #[test]
  fn garbage_is_rejected() {
    assert!(matches!(normalize_dob("not-a-date"), Err(Error::InvalidDate(_))));
    assert!(matches!(normalize_dob(""), Err(Error::InvalidDate(_))));
  }

  #[test]
  fn impossible_date_is_rejected() {
    assert!(normalize_dob("31/02/2001").is_err());
    assert!(normalize_dob("2001-02-31").is_err());
  }

  #[test]
  fn two_digit_year_is_rejected() {
    assert!(normalize_dob("15/06/90").is_err());
  }

  #[test]
  fn extra_components_are_rejected() {
    assert!(normalize_dob("15/06/1990/01").is_err());
    assert!(normalize_dob("15/ab/1990").is_err());
  }
}
