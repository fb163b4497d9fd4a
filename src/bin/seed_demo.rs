use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;

use budget_ledger::db;
use budget_ledger::domain::schedule::days_in_month;
use budget_ledger::error::AppError;
use budget_ledger::models::{Frequency, TransactionKind};
use budget_ledger::{ledger, logging, recurring};

fn main() -> Result<(), Box<dyn std::error::Error>> {
  logging::init_tracing();

  let count = std::env::args()
    .nth(1)
    .and_then(|value| value.parse::<usize>().ok())
    .unwrap_or(500);

  let app_dir = if let Ok(path) = std::env::var("BUDGET_LEDGER_SEED_DIR") {
    PathBuf::from(path)
  } else {
    db::resolve_app_dir()?
  };

  let db = db::init_db(&app_dir)?;
  let seeded = db::with_conn(&db, |conn| seed_demo_data(conn, count))?;

  println!(
    "Seeded {} transactions and {} recurring definitions in {}",
    seeded.transactions,
    seeded.definitions,
    app_dir.display()
  );
  Ok(())
}

#[derive(Debug, Default, PartialEq)]
struct Seeded {
  transactions: usize,
  definitions: usize,
}

/// Attempts `count` random transactions; the returned counts are rows actually written.
fn seed_demo_data(conn: &mut Connection, count: usize) -> Result<Seeded, AppError> {
  let year = Local::now().year();
  let income_names = ["Salary", "Freelance", "Refund", "Gift", "Interest"];
  let expense_names = ["Groceries", "Rent", "Fuel", "Utilities", "Dining out", "Books", "Gym"];

  let mut rng = rand::thread_rng();
  let mut seeded = Seeded::default();

  for _ in 0..count {
    let month = rng.gen_range(1..=12);
    let day = rng.gen_range(1..=days_in_month(year, month));
    let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
      continue;
    };

    let is_income = rng.gen_range(0..100) < 35;
    let (kind, names, min, max) = if is_income {
      (TransactionKind::Income, &income_names[..], 50.0, 2500.0)
    } else {
      (TransactionKind::Expense, &expense_names[..], 5.0, 900.0)
    };
    let name = names.choose(&mut rng).copied().unwrap_or("Demo");
    let amount = (rng.gen_range(min..max) * 100.0_f64).round() / 100.0;

    ledger::insert_transaction(conn, kind, date, &format!("Demo: {name}"), amount)?;
    seeded.transactions += 1;
  }

  if recurring::list_recurring_rows(conn)?.is_empty() {
    let january = |day| NaiveDate::from_ymd_opt(year, 1, day);
    let defaults = [
      (TransactionKind::Income, "Salary", 2400.0, january(25), Frequency::Monthly),
      (TransactionKind::Expense, "Rent", 950.0, january(1), Frequency::Monthly),
      (TransactionKind::Expense, "Cleaner", 40.0, january(5), Frequency::Weekly),
      (TransactionKind::Expense, "Insurance", 310.0, january(31), Frequency::Yearly),
    ];
    for (kind, name, amount, start, frequency) in defaults {
      if let Some(start) = start {
        recurring::insert_recurring_definition(conn, kind, name, amount, start, frequency)?;
        seeded.definitions += 1;
      }
    }
  }

  Ok(seeded)
}
