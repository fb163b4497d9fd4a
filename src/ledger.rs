use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde_json::json;

use crate::audit::log::append_audit;
use crate::domain::validation;
use crate::error::AppError;
use crate::models::{Transaction, TransactionKind};

/// Writes the row and its audit entry in one transaction.
pub fn insert_transaction(
  conn: &mut Connection,
  kind: TransactionKind,
  date: NaiveDate,
  description: &str,
  amount: f64,
) -> Result<i64, AppError> {
  validation::ensure_amount_positive(amount)?;
  let description = validation::normalize_description(description)?;
  let date_str = validation::format_date(date);

  let tx = conn.transaction()?;
  let sql = format!("INSERT INTO {} (date, name, amount) VALUES (?1, ?2, ?3)", kind.table());
  tx.execute(&sql, params![date_str, description, amount])?;
  let id = tx.last_insert_rowid();

  append_audit(
    &tx,
    "CREATE_TX",
    "TRANSACTION",
    Some(id.to_string()),
    json!({ "kind": kind, "date": date_str, "description": description, "amount": amount }).to_string(),
  )?;
  tx.commit()?;
  Ok(id)
}

/// Text-input variant used by form collaborators; kind and date are parsed and validated.
pub fn insert_transaction_from_input(
  conn: &mut Connection,
  kind: &str,
  date: &str,
  description: &str,
  amount: f64,
) -> Result<i64, AppError> {
  let kind = validation::parse_kind(kind)?;
  let date = validation::parse_date(date)?;
  insert_transaction(conn, kind, date, description, amount)
}

/// Rows of one kind in insertion order.
pub fn list_transactions(conn: &Connection, kind: TransactionKind) -> Result<Vec<Transaction>, AppError> {
  let sql = format!("SELECT id, date, name, amount FROM {} ORDER BY id", kind.table());
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt.query_map([], |row| map_transaction(row, kind))?;
  Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Income rows followed by expense rows, each in insertion order.
pub fn list_all_transactions(conn: &Connection) -> Result<Vec<Transaction>, AppError> {
  let mut items = Vec::new();
  for kind in TransactionKind::ALL {
    items.extend(list_transactions(conn, kind)?);
  }
  Ok(items)
}

pub fn get_transaction(conn: &Connection, kind: TransactionKind, id: i64) -> Result<Transaction, AppError> {
  let sql = format!("SELECT id, date, name, amount FROM {} WHERE id = ?1", kind.table());
  let mut stmt = conn.prepare(&sql)?;
  let mut rows = stmt.query(params![id])?;
  match rows.next()? {
    Some(row) => Ok(map_transaction(row, kind)?),
    None => Err(AppError::not_found("transaction", id)),
  }
}

/// Returns whether a row was removed; a missing id is not an error.
pub fn delete_transaction(conn: &mut Connection, kind: TransactionKind, id: i64) -> Result<bool, AppError> {
  let tx = conn.transaction()?;
  let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
  let removed = tx.execute(&sql, params![id])?;
  if removed == 0 {
    tracing::debug!(%kind, id, "delete of missing transaction ignored");
    return Ok(false);
  }

  append_audit(
    &tx,
    "DELETE_TX",
    "TRANSACTION",
    Some(id.to_string()),
    json!({ "kind": kind }).to_string(),
  )?;
  tx.commit()?;
  Ok(true)
}

pub fn clear_transactions(conn: &mut Connection, kind: TransactionKind) -> Result<usize, AppError> {
  let tx = conn.transaction()?;
  let sql = format!("DELETE FROM {}", kind.table());
  let removed = tx.execute(&sql, [])?;
  append_audit(
    &tx,
    "CLEAR_TX",
    "TRANSACTION",
    None,
    json!({ "kind": kind, "removed": removed }).to_string(),
  )?;
  tx.commit()?;
  Ok(removed)
}

fn map_transaction(row: &Row<'_>, kind: TransactionKind) -> rusqlite::Result<Transaction> {
  let date: String = row.get(1)?;
  let date = NaiveDate::parse_from_str(&date, validation::DATE_FORMAT).map_err(|err| {
    rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(err))
  })?;
  Ok(Transaction {
    id: row.get(0)?,
    kind,
    date,
    description: row.get(2)?,
    amount: row.get(3)?,
  })
}
