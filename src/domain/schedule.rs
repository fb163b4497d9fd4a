//! Due-date rules for recurring definitions.
//!
//! Monthly and yearly rules match the reference date's day (and month, for
//! yearly). When that day does not exist in the target month the last day of
//! the month is used. A reference that was itself clamped to a month end keeps
//! the start date's day, so a definition starting on the 31st posts on Feb 29
//! (or 28), Mar 31, Apr 30, and so on.

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::Frequency;

pub fn is_due(
  frequency: Frequency,
  start_date: NaiveDate,
  last_processed: Option<NaiveDate>,
  as_of: NaiveDate,
) -> bool {
  let reference = last_processed.unwrap_or(start_date);
  if as_of < reference {
    return false;
  }
  if last_processed == Some(as_of) {
    return false;
  }

  match frequency {
    Frequency::Daily => true,
    Frequency::Weekly => (as_of - reference).num_days() % 7 == 0,
    Frequency::Monthly => as_of.day() == clamped_day(as_of.year(), as_of.month(), anchor_day(start_date, reference)),
    Frequency::Yearly => {
      as_of.month() == reference.month()
        && as_of.day() == clamped_day(as_of.year(), as_of.month(), anchor_day(start_date, reference))
    }
  }
}

/// Day-of-month the next posting aims for.
fn anchor_day(start_date: NaiveDate, reference: NaiveDate) -> u32 {
  let reference_day = reference.day();
  let was_clamped = reference_day == days_in_month(reference.year(), reference.month())
    && start_date.day() > reference_day;
  if was_clamped {
    start_date.day()
  } else {
    reference_day
  }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
  let next = if month == 12 {
    NaiveDate::from_ymd_opt(year + 1, 1, 1)
  } else {
    NaiveDate::from_ymd_opt(year, month + 1, 1)
  };
  match next {
    Some(first_of_next) => (first_of_next - Duration::days(1)).day(),
    None => 31,
  }
}

fn clamped_day(year: i32, month: u32, anchor_day: u32) -> u32 {
  anchor_day.min(days_in_month(year, month))
}
