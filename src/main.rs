use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use budget_ledger::db::{self, Db};
use budget_ledger::domain::validation;
use budget_ledger::error::AppError;
use budget_ledger::scheduler::{Clock, LocalClock, Scheduler};
use budget_ledger::{logging, recurrence, reports, settings};

struct Options {
  once: bool,
  as_of: Option<NaiveDate>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  logging::init_tracing();
  let options = parse_args(std::env::args().skip(1))?;

  let app_dir = db::resolve_app_dir()?;
  let db = Arc::new(db::init_db(&app_dir)?);
  let settings = db::with_conn(&db, |conn| settings::get_settings(conn))?;

  if options.once {
    let as_of = options.as_of.unwrap_or_else(|| LocalClock.today());
    let report = recurrence::sync(&db, as_of)?;
    println!(
      "Posted {} recurring transaction(s) for {} ({} skipped)",
      report.posted_count(),
      as_of,
      report.skipped.len()
    );
    print_summary(&db, &settings.currency_symbol)?;
    return Ok(());
  }

  let scheduler = Scheduler::start(
    Arc::clone(&db),
    Duration::from_secs(settings.sync_interval_secs),
    LocalClock,
  )?;
  println!(
    "Budget ledger running from {} (sync every {}s). Type 'summary' or 'quit'.",
    app_dir.display(),
    settings.sync_interval_secs
  );

  let stdin = std::io::stdin();
  for line in stdin.lock().lines() {
    match line?.trim() {
      "quit" | "exit" => break,
      "summary" => print_summary(&db, &settings.currency_symbol)?,
      "" => {}
      other => println!("Unknown command '{other}'"),
    }
  }

  scheduler.stop();
  Ok(())
}

fn print_summary(db: &Db, currency: &str) -> Result<(), AppError> {
  let summary = db::with_conn(db, |conn| reports::summary(conn))?;
  println!("Total Income: {currency}{:.2}", summary.total_income);
  println!("Total Expenses: {currency}{:.2}", summary.total_expense);
  println!("Net Balance: {currency}{:.2}", summary.net_balance);
  Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, AppError> {
  let mut options = Options { once: false, as_of: None };
  while let Some(arg) = args.next() {
    match arg.as_str() {
      "--once" => options.once = true,
      "--as-of" => {
        let value = args
          .next()
          .ok_or_else(|| AppError::new("INVALID_ARGS", "--as-of needs a YYYY-MM-DD value"))?;
        options.as_of = Some(validation::parse_date(&value)?);
      }
      other => return Err(AppError::new("INVALID_ARGS", format!("unknown argument '{other}'"))),
    }
  }
  if options.as_of.is_some() && !options.once {
    return Err(AppError::new("INVALID_ARGS", "--as-of only applies together with --once"));
  }
  Ok(options)
}
