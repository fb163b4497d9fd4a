use rusqlite::Connection;

use crate::error::AppError;
use crate::models::{MonthlyTotal, Summary, TransactionKind};

pub fn total_amount(conn: &Connection, kind: TransactionKind) -> Result<f64, AppError> {
  let sql = format!("SELECT COALESCE(SUM(amount), 0) FROM {}", kind.table());
  let total: f64 = conn.query_row(&sql, [], |row| row.get(0))?;
  Ok(total)
}

pub fn summary(conn: &Connection) -> Result<Summary, AppError> {
  let total_income = total_amount(conn, TransactionKind::Income)?;
  let total_expense = total_amount(conn, TransactionKind::Expense)?;
  Ok(Summary {
    total_income,
    total_expense,
    net_balance: total_income - total_expense,
  })
}

/// Income and expense totals per `YYYY-MM`, oldest month first.
pub fn monthly_totals(conn: &Connection) -> Result<Vec<MonthlyTotal>, AppError> {
  let mut stmt = conn.prepare(
    "SELECT strftime('%Y-%m', date) AS month,
        COALESCE(SUM(CASE WHEN kind = 'income' THEN amount END), 0),
        COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount END), 0)
     FROM (
       SELECT date, amount, 'income' AS kind FROM income
       UNION ALL
       SELECT date, amount, 'expense' AS kind FROM expenses
     )
     GROUP BY month
     ORDER BY month",
  )?;
  let rows = stmt.query_map([], |row| {
    Ok(MonthlyTotal {
      month: row.get(0)?,
      total_income: row.get(1)?,
      total_expense: row.get(2)?,
    })
  })?;
  Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
