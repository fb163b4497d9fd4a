use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{Frequency, TransactionKind};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(date: &str) -> Result<NaiveDate, AppError> {
  NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
    .map_err(|_| AppError::new("INVALID_DATE", format!("date must be YYYY-MM-DD, got '{date}'")))
}

pub fn format_date(date: NaiveDate) -> String {
  date.format(DATE_FORMAT).to_string()
}

pub fn ensure_amount_positive(amount: f64) -> Result<(), AppError> {
  if !amount.is_finite() || amount <= 0.0 {
    Err(AppError::new("INVALID_AMOUNT", "amount must be > 0"))
  } else {
    Ok(())
  }
}

pub fn normalize_description(description: &str) -> Result<String, AppError> {
  let trimmed = description.trim();
  if trimmed.is_empty() {
    Err(AppError::new("INVALID_DESCRIPTION", "description must not be empty"))
  } else {
    Ok(trimmed.to_string())
  }
}

pub fn parse_kind(value: &str) -> Result<TransactionKind, AppError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "income" => Ok(TransactionKind::Income),
    "expense" => Ok(TransactionKind::Expense),
    _ => Err(AppError::new(
      "INVALID_KIND",
      format!("kind must be income or expense, got '{value}'"),
    )),
  }
}

pub fn parse_frequency(value: &str) -> Result<Frequency, AppError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "daily" => Ok(Frequency::Daily),
    "weekly" => Ok(Frequency::Weekly),
    "monthly" => Ok(Frequency::Monthly),
    "yearly" => Ok(Frequency::Yearly),
    _ => Err(AppError::new(
      "INVALID_FREQUENCY",
      format!("frequency must be daily, weekly, monthly or yearly, got '{value}'"),
    )),
  }
}
