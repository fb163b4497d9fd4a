//! Replays recurring definitions into the ledger.
//!
//! A sync pass walks every stored definition, posts the ones that are due on
//! `as_of`, and advances their last-processed date. Each posting is its own
//! IMMEDIATE transaction, so the ledger row and the marker move together.
//! Bad definitions are skipped and reported; storage failures end the pass.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::json;
use thiserror::Error;

use crate::audit::log::append_audit;
use crate::db::{self, Db};
use crate::domain::{schedule, validation};
use crate::error::AppError;
use crate::models::{RecurringDefinition, TransactionKind};
use crate::recurring;

#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
  pub definition_id: i64,
  pub transaction_id: i64,
  pub kind: TransactionKind,
  pub amount: f64,
  pub date: NaiveDate,
}

#[derive(Debug, Error)]
pub enum SkipReason {
  #[error("invalid definition: {0}")]
  Invalid(AppError),
  #[error("posting failed: {0}")]
  PostingFailed(rusqlite::Error),
}

#[derive(Debug)]
pub struct SkippedDefinition {
  pub definition_id: i64,
  pub reason: SkipReason,
}

#[derive(Debug)]
pub struct SyncReport {
  pub as_of: NaiveDate,
  pub posted: Vec<Posting>,
  pub skipped: Vec<SkippedDefinition>,
}

impl SyncReport {
  pub fn posted_count(&self) -> usize {
    self.posted.len()
  }
}

#[derive(Debug, Error)]
enum PostError {
  #[error(transparent)]
  Sql(#[from] rusqlite::Error),
  #[error(transparent)]
  Store(#[from] AppError),
}

/// Runs one sync pass against the store. Callers must not run passes concurrently.
pub fn sync(db: &Db, as_of: NaiveDate) -> Result<SyncReport, AppError> {
  db::with_conn(db, |conn| sync_conn(conn, as_of))
}

pub fn sync_conn(conn: &mut Connection, as_of: NaiveDate) -> Result<SyncReport, AppError> {
  let mut report = SyncReport {
    as_of,
    posted: Vec::new(),
    skipped: Vec::new(),
  };

  for (definition_id, row) in recurring::list_recurring_rows(conn)? {
    let definition = match row.and_then(recurring::parse_row) {
      Ok(definition) => definition,
      Err(err) => {
        tracing::warn!(definition_id, error = %err, "skipping invalid recurring definition");
        report.skipped.push(SkippedDefinition {
          definition_id,
          reason: SkipReason::Invalid(err),
        });
        continue;
      }
    };

    match post_if_due(conn, &definition, as_of) {
      Ok(Some(posting)) => {
        tracing::info!(
          definition_id,
          transaction_id = posting.transaction_id,
          kind = %posting.kind,
          amount = posting.amount,
          date = %posting.date,
          "posted recurring transaction"
        );
        report.posted.push(posting);
      }
      Ok(None) => {}
      Err(PostError::Sql(err)) if is_definition_scoped(&err) => {
        tracing::warn!(definition_id, error = %err, "recurring posting rolled back");
        report.skipped.push(SkippedDefinition {
          definition_id,
          reason: SkipReason::PostingFailed(err),
        });
      }
      Err(PostError::Sql(err)) => {
        tracing::error!(definition_id, error = %err, "sync pass aborted");
        return Err(err.into());
      }
      Err(PostError::Store(err)) => {
        tracing::error!(definition_id, error = %err, "sync pass aborted");
        return Err(err);
      }
    }
  }

  tracing::info!(
    %as_of,
    posted = report.posted.len(),
    skipped = report.skipped.len(),
    "sync pass finished"
  );
  Ok(report)
}

fn post_if_due(
  conn: &mut Connection,
  definition: &RecurringDefinition,
  as_of: NaiveDate,
) -> Result<Option<Posting>, PostError> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  // Re-read the marker under the write lock so a concurrent pass cannot double-post.
  let current: Option<Option<String>> = tx
    .query_row(
      "SELECT last_processed_date FROM recurring_transactions WHERE id = ?1",
      params![definition.id],
      |row| row.get(0),
    )
    .optional()?;
  let Some(current) = current else {
    return Ok(None);
  };
  let last_processed = match current.as_deref().filter(|value| !value.trim().is_empty()) {
    Some(value) => Some(parse_stored_date(value)?),
    None => None,
  };

  if !schedule::is_due(definition.frequency, definition.start_date, last_processed, as_of) {
    return Ok(None);
  }

  let date_str = validation::format_date(as_of);
  let insert = format!(
    "INSERT INTO {} (date, name, amount) VALUES (?1, ?2, ?3)",
    definition.kind.table()
  );
  tx.execute(&insert, params![date_str, definition.description, definition.amount])?;
  let transaction_id = tx.last_insert_rowid();

  tx.execute(
    "UPDATE recurring_transactions SET last_processed_date = ?1 WHERE id = ?2",
    params![date_str, definition.id],
  )?;

  append_audit(
    &tx,
    "RECURRING_POST",
    "TRANSACTION",
    Some(transaction_id.to_string()),
    json!({
      "definition_id": definition.id,
      "kind": definition.kind,
      "description": definition.description,
      "amount": definition.amount,
      "date": date_str,
      "frequency": definition.frequency,
    })
    .to_string(),
  )?;

  tx.commit()?;
  Ok(Some(Posting {
    definition_id: definition.id,
    transaction_id,
    kind: definition.kind,
    amount: definition.amount,
    date: as_of,
  }))
}

fn parse_stored_date(value: &str) -> Result<NaiveDate, rusqlite::Error> {
  NaiveDate::parse_from_str(value.trim(), validation::DATE_FORMAT)
    .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err)))
}

/// Errors caused by one definition's data rather than by the store itself.
fn is_definition_scoped(err: &rusqlite::Error) -> bool {
  match err {
    rusqlite::Error::SqliteFailure(failure, _) => failure.code == rusqlite::ErrorCode::ConstraintViolation,
    rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => true,
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  use crate::ledger;
  use crate::models::Frequency;
  use crate::recurring::{get_recurring_definition, insert_recurring_definition};
  use crate::reports::total_amount;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn daily_sync_twice_on_the_same_day_posts_once() {
    let db = Db::open_in_memory().unwrap();
    let id = db::with_conn(&db, |conn| {
      insert_recurring_definition(conn, TransactionKind::Expense, "Coffee", 3.5, d(2024, 5, 1), Frequency::Daily)
    })
    .unwrap();

    assert_eq!(sync(&db, d(2024, 5, 3)).unwrap().posted_count(), 1);
    assert_eq!(sync(&db, d(2024, 5, 3)).unwrap().posted_count(), 0);
    assert_eq!(sync(&db, d(2024, 5, 4)).unwrap().posted_count(), 1);

    db::with_conn(&db, |conn| {
      assert_eq!(ledger::list_transactions(conn, TransactionKind::Expense)?.len(), 2);
      assert_eq!(get_recurring_definition(conn, id)?.last_processed, Some(d(2024, 5, 4)));
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn future_start_changes_nothing() {
    let db = Db::open_in_memory().unwrap();
    db::with_conn(&db, |conn| {
      insert_recurring_definition(conn, TransactionKind::Income, "Pension", 900.0, d(2030, 1, 1), Frequency::Monthly)?;
      insert_recurring_definition(conn, TransactionKind::Expense, "Tax", 90.0, d(2030, 1, 1), Frequency::Daily)?;
      Ok(())
    })
    .unwrap();

    let report = sync(&db, d(2024, 1, 1)).unwrap();
    assert_eq!(report.posted_count(), 0);
    assert!(report.skipped.is_empty());
    db::with_conn(&db, |conn| {
      assert_eq!(total_amount(conn, TransactionKind::Income)?, 0.0);
      assert!(recurring::list_recurring_definitions(conn)?.iter().all(|d| d.last_processed.is_none()));
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn bad_rows_are_reported_and_the_rest_still_post() {
    let db = Db::open_in_memory().unwrap();
    db::with_conn(&db, |conn| {
      conn.execute(
        "INSERT INTO recurring_transactions (type, name, amount, start_date, frequency) VALUES ('expense', 'Odd', 5.0, '2024-01-01', 'fortnightly')",
        [],
      )?;
      conn.execute(
        "INSERT INTO recurring_transactions (type, name, amount, start_date, frequency) VALUES ('income', 'Nothing', -1.0, '2024-01-01', 'daily')",
        [],
      )?;
      insert_recurring_definition(conn, TransactionKind::Income, "Salary", 100.0, d(2024, 1, 1), Frequency::Daily)?;
      Ok(())
    })
    .unwrap();

    let report = sync(&db, d(2024, 1, 2)).unwrap();
    assert_eq!(report.posted_count(), 1);
    assert_eq!(report.skipped.len(), 2);
    assert!(report
      .skipped
      .iter()
      .all(|skip| matches!(skip.reason, SkipReason::Invalid(_))));
  }

  #[test]
  fn unreadable_amount_is_skipped_not_fatal() {
    let db = Db::open_in_memory().unwrap();
    let (good, bad) = db::with_conn(&db, |conn| {
      let good =
        insert_recurring_definition(conn, TransactionKind::Income, "Salary", 100.0, d(2024, 1, 1), Frequency::Daily)?;
      conn.execute(
        "INSERT INTO recurring_transactions (type, name, amount, start_date, frequency) VALUES ('income', 'Text', 'abc', '2024-01-01', 'daily')",
        [],
      )?;
      Ok((good, conn.last_insert_rowid()))
    })
    .unwrap();

    let report = sync(&db, d(2024, 1, 2)).unwrap();
    assert_eq!(report.posted_count(), 1);
    assert_eq!(report.posted[0].definition_id, good);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].definition_id, bad);
    assert!(matches!(&report.skipped[0].reason, SkipReason::Invalid(err) if err.code == "INVALID_DEFINITION"));
  }

  #[test]
  fn store_failure_aborts_without_partial_postings() {
    let db = Db::open_in_memory().unwrap();
    let (income, expense) = db::with_conn(&db, |conn| {
      let income =
        insert_recurring_definition(conn, TransactionKind::Income, "Salary", 100.0, d(2024, 1, 1), Frequency::Daily)?;
      let expense =
        insert_recurring_definition(conn, TransactionKind::Expense, "Rent", 50.0, d(2024, 1, 1), Frequency::Daily)?;
      conn.execute_batch("DROP TABLE income;")?;
      Ok((income, expense))
    })
    .unwrap();

    let err = sync(&db, d(2024, 1, 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);

    db::with_conn(&db, |conn| {
      assert!(ledger::list_transactions(conn, TransactionKind::Expense)?.is_empty());
      assert_eq!(get_recurring_definition(conn, income)?.last_processed, None);
      assert_eq!(get_recurring_definition(conn, expense)?.last_processed, None);
      let posts: i64 =
        conn.query_row("SELECT COUNT(*) FROM audit_log WHERE action = 'RECURRING_POST'", [], |row| row.get(0))?;
      assert_eq!(posts, 0);
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn constraint_failure_rolls_back_only_that_definition() {
    let db = Db::open_in_memory().unwrap();
    let (blocked, healthy) = db::with_conn(&db, |conn| {
      let blocked =
        insert_recurring_definition(conn, TransactionKind::Expense, "Blocked", 10.0, d(2024, 1, 1), Frequency::Daily)?;
      let healthy =
        insert_recurring_definition(conn, TransactionKind::Income, "Healthy", 20.0, d(2024, 1, 1), Frequency::Daily)?;
      conn.execute_batch(
        "CREATE TRIGGER block_expense BEFORE INSERT ON expenses
         WHEN NEW.name = 'Blocked'
         BEGIN SELECT RAISE(ABORT, 'blocked by test'); END;",
      )?;
      Ok((blocked, healthy))
    })
    .unwrap();

    let report = sync(&db, d(2024, 1, 1)).unwrap();
    assert_eq!(report.posted_count(), 1);
    assert_eq!(report.posted[0].definition_id, healthy);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].definition_id, blocked);
    assert!(matches!(report.skipped[0].reason, SkipReason::PostingFailed(_)));

    db::with_conn(&db, |conn| {
      assert_eq!(get_recurring_definition(conn, blocked)?.last_processed, None);
      assert!(ledger::list_transactions(conn, TransactionKind::Expense)?.is_empty());
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn postings_are_audited() {
    let db = Db::open_in_memory().unwrap();
    db::with_conn(&db, |conn| {
      insert_recurring_definition(conn, TransactionKind::Income, "Salary", 100.0, d(2024, 1, 1), Frequency::Monthly)?;
      Ok(())
    })
    .unwrap();
    sync(&db, d(2024, 1, 1)).unwrap();

    let entries = db::with_conn(&db, |conn| crate::audit::log::list_audit_log(conn, 5)).unwrap();
    assert_eq!(entries[0].action, "RECURRING_POST");
  }
}
