use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;

use crate::audit::log::append_audit;
use crate::domain::validation;
use crate::error::AppError;
use crate::models::{Frequency, RecurringDefinition, RecurringRow, TransactionKind};

const SELECT_COLUMNS: &str =
  "SELECT id, type, name, amount, start_date, frequency, last_processed_date FROM recurring_transactions";

pub fn insert_recurring_definition(
  conn: &mut Connection,
  kind: TransactionKind,
  description: &str,
  amount: f64,
  start_date: NaiveDate,
  frequency: Frequency,
) -> Result<i64, AppError> {
  validation::ensure_amount_positive(amount)?;
  let description = validation::normalize_description(description)?;
  let start_str = validation::format_date(start_date);

  let tx = conn.transaction()?;
  tx.execute(
    "INSERT INTO recurring_transactions (type, name, amount, start_date, frequency, last_processed_date)
     VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
    params![kind.as_str(), description, amount, start_str, frequency.as_str()],
  )?;
  let id = tx.last_insert_rowid();

  append_audit(
    &tx,
    "CREATE_RECURRING",
    "RECURRING",
    Some(id.to_string()),
    json!({
      "kind": kind,
      "description": description,
      "amount": amount,
      "start_date": start_str,
      "frequency": frequency,
    })
    .to_string(),
  )?;
  tx.commit()?;
  Ok(id)
}

/// Text-input variant used by form collaborators.
pub fn insert_recurring_definition_from_input(
  conn: &mut Connection,
  kind: &str,
  description: &str,
  amount: f64,
  start_date: &str,
  frequency: &str,
) -> Result<i64, AppError> {
  let kind = validation::parse_kind(kind)?;
  let start_date = validation::parse_date(start_date)?;
  let frequency = validation::parse_frequency(frequency)?;
  insert_recurring_definition(conn, kind, description, amount, start_date, frequency)
}

/// Raw rows in id order, keyed by id. A row whose columns have the wrong
/// storage type comes back as an `INVALID_DEFINITION` error in its slot;
/// only failures of the query itself fail the whole listing.
pub fn list_recurring_rows(conn: &Connection) -> Result<Vec<(i64, Result<RecurringRow, AppError>)>, AppError> {
  let sql = format!("{SELECT_COLUMNS} ORDER BY id");
  let mut stmt = conn.prepare(&sql)?;
  let mut rows = stmt.query([])?;

  let mut out = Vec::new();
  while let Some(row) = rows.next()? {
    let id: i64 = row.get(0)?;
    out.push((id, map_row(row).map_err(unreadable_row)));
  }
  Ok(out)
}

pub fn get_recurring_row(conn: &Connection, id: i64) -> Result<Option<RecurringRow>, AppError> {
  let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
  let row = conn.query_row(&sql, params![id], |row| Ok(map_row(row))).optional()?;
  row.map(|row| row.map_err(unreadable_row)).transpose()
}

/// Valid definitions only; rows that fail validation are logged and left out.
pub fn list_recurring_definitions(conn: &Connection) -> Result<Vec<RecurringDefinition>, AppError> {
  let mut definitions = Vec::new();
  for (id, row) in list_recurring_rows(conn)? {
    match row.and_then(parse_row) {
      Ok(definition) => definitions.push(definition),
      Err(err) => tracing::warn!(id, error = %err, "skipping invalid recurring definition"),
    }
  }
  Ok(definitions)
}

pub fn get_recurring_definition(conn: &Connection, id: i64) -> Result<RecurringDefinition, AppError> {
  match get_recurring_row(conn, id)? {
    Some(row) => parse_row(row),
    None => Err(AppError::not_found("recurring definition", id)),
  }
}

/// Returns whether a definition was updated; a missing id is not an error.
pub fn update_last_processed(conn: &mut Connection, id: i64, date: NaiveDate) -> Result<bool, AppError> {
  let tx = conn.transaction()?;
  let start: Option<String> = tx
    .query_row(
      "SELECT start_date FROM recurring_transactions WHERE id = ?1",
      params![id],
      |row| row.get(0),
    )
    .optional()?;
  let Some(start) = start else {
    tracing::debug!(id, "last-processed update of missing definition ignored");
    return Ok(false);
  };

  let start = validation::parse_date(&start)?;
  if date < start {
    return Err(AppError::new(
      "INVALID_LAST_PROCESSED",
      format!("last processed date {date} is before start date {start}"),
    ));
  }

  let date_str = validation::format_date(date);
  tx.execute(
    "UPDATE recurring_transactions SET last_processed_date = ?1 WHERE id = ?2",
    params![date_str, id],
  )?;
  append_audit(
    &tx,
    "ADVANCE_RECURRING",
    "RECURRING",
    Some(id.to_string()),
    json!({ "last_processed_date": date_str }).to_string(),
  )?;
  tx.commit()?;
  Ok(true)
}

pub fn delete_recurring_definition(conn: &mut Connection, id: i64) -> Result<bool, AppError> {
  let tx = conn.transaction()?;
  let removed = tx.execute("DELETE FROM recurring_transactions WHERE id = ?1", params![id])?;
  if removed == 0 {
    tracing::debug!(id, "delete of missing recurring definition ignored");
    return Ok(false);
  }
  append_audit(&tx, "DELETE_RECURRING", "RECURRING", Some(id.to_string()), "{}".to_string())?;
  tx.commit()?;
  Ok(true)
}

/// Validates a stored row into a definition.
pub fn parse_row(row: RecurringRow) -> Result<RecurringDefinition, AppError> {
  let kind = validation::parse_kind(&row.kind)?;
  let frequency = validation::parse_frequency(&row.frequency)?;
  validation::ensure_amount_positive(row.amount)?;
  let start_date = validation::parse_date(&row.start_date)?;
  let last_processed = row
    .last_processed
    .as_deref()
    .filter(|value| !value.trim().is_empty())
    .map(validation::parse_date)
    .transpose()?;

  if let Some(last) = last_processed {
    if last < start_date {
      return Err(AppError::new(
        "INVALID_LAST_PROCESSED",
        format!("last processed date {last} is before start date {start_date}"),
      ));
    }
  }

  Ok(RecurringDefinition {
    id: row.id,
    kind,
    description: row.description,
    amount: row.amount,
    start_date,
    frequency,
    last_processed,
  })
}

fn unreadable_row(err: rusqlite::Error) -> AppError {
  AppError::new("INVALID_DEFINITION", format!("unreadable recurring definition: {err}"))
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<RecurringRow> {
  Ok(RecurringRow {
    id: row.get(0)?,
    kind: row.get(1)?,
    description: row.get(2)?,
    amount: row.get(3)?,
    start_date: row.get(4)?,
    frequency: row.get(5)?,
    last_processed: row.get(6)?,
  })
}
