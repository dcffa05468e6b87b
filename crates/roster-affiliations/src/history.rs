//! Parsing of feed emails and affiliation history strings.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use roster_core::entity::{beginning_of_time, end_of_time};

use crate::{Error, Result};

static OBFUSCATED_EMAIL: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"([^\s!]+)!([^\s!]+)").expect("valid email pattern"));

/// Turn `user!example.com` back into `user@example.com` and lower-case it.
pub fn decode_email(email: &str) -> String {
  OBFUSCATED_EMAIL
    .replace_all(email, "${1}@${2}")
    .to_lowercase()
}

/// History values that carry no affiliation at all.
pub fn is_unknown(affiliation: &str) -> bool {
  matches!(affiliation, "" | "NotFound" | "(Unknown)" | "?")
}

/// Parse a boundary date at any supported granularity, from
/// `YYYY-MM-DD HH:MM:SS` down to a bare `YYYY`. Missing parts default to
/// their lowest value; the result is UTC.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
  let value = value.trim();
  let date_time = |s: &str, fmt: &str| NaiveDateTime::parse_from_str(s, fmt).ok();
  let date = |s: &str| {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
      .ok()
      .and_then(|d| d.and_hms_opt(0, 0, 0))
  };

  date_time(value, "%Y-%m-%d %H:%M:%S")
    .or_else(|| date_time(value, "%Y-%m-%d %H:%M"))
    .or_else(|| date_time(&format!("{value}:00"), "%Y-%m-%d %H:%M"))
    .or_else(|| date(value))
    .or_else(|| date(&format!("{value}-01")))
    .or_else(|| date(&format!("{value}-01-01")))
    .map(|naive| naive.and_utc())
    .ok_or_else(|| Error::InvalidDate(value.to_owned()))
}

/// One interval of an affiliation history, before company-name mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
  pub company: String,
  pub start:   DateTime<Utc>,
  pub end:     DateTime<Utc>,
}

/// Parse `"Acme < 2019-01-01, Globex"` into contiguous segments.
///
/// Segments are separated by `", "`. A segment is either `company < date`
/// (ending on `date`) or a bare `company` (ending at [`end_of_time`]). The
/// first segment starts at [`beginning_of_time`] and each later one starts
/// where the previous one ended. Unknown histories yield no segments.
///
/// Company names are trimmed and may come out empty; callers decide what to
/// do with those. An unparseable date is an error.
pub fn parse_history(affiliation: &str) -> Result<Vec<Segment>> {
  if is_unknown(affiliation) {
    return Ok(Vec::new());
  }

  let mut start = beginning_of_time();
  affiliation
    .split(", ")
    .map(|part| -> Result<Segment> {
      let mut pieces = part.split(" < ");
      let company = pieces.next().unwrap_or_default().trim().to_owned();
      let end = match pieces.next() {
        Some(date) => parse_date(date)?,
        None => end_of_time(),
      };
      let segment = Segment { company, start, end };
      start = end;
      Ok(segment)
    })
    .collect()
}
