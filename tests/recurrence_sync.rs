use budget_ledger::db::{init_db, with_conn, Db};
use budget_ledger::ledger::{delete_transaction, insert_transaction, list_transactions};
use budget_ledger::models::{Frequency, TransactionKind};
use budget_ledger::recurrence::sync;
use budget_ledger::recurring::{get_recurring_definition, insert_recurring_definition, update_last_processed};
use budget_ledger::reports::{monthly_totals, total_amount};
use chrono::NaiveDate;
use tempfile::tempdir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn add_definition(db: &Db, kind: TransactionKind, amount: f64, start: NaiveDate, frequency: Frequency) -> i64 {
  with_conn(db, |conn| insert_recurring_definition(conn, kind, "Recurring", amount, start, frequency)).unwrap()
}

#[test]
fn monthly_salary_end_to_end() {
  let db = Db::open_in_memory().unwrap();
  let id = add_definition(&db, TransactionKind::Income, 1200.0, d(2024, 1, 15), Frequency::Monthly);

  let report = sync(&db, d(2024, 1, 15)).unwrap();
  assert_eq!(report.posted_count(), 1);
  with_conn(&db, |conn| {
    let income = list_transactions(conn, TransactionKind::Income)?;
    assert_eq!(income.len(), 1);
    assert_eq!(income[0].amount, 1200.0);
    assert_eq!(income[0].date, d(2024, 1, 15));
    assert_eq!(get_recurring_definition(conn, id)?.last_processed, Some(d(2024, 1, 15)));
    Ok(())
  })
  .unwrap();

  assert_eq!(sync(&db, d(2024, 2, 15)).unwrap().posted_count(), 1);
  with_conn(&db, |conn| {
    assert_eq!(list_transactions(conn, TransactionKind::Income)?.len(), 2);
    assert_eq!(get_recurring_definition(conn, id)?.last_processed, Some(d(2024, 2, 15)));
    Ok(())
  })
  .unwrap();

  assert_eq!(sync(&db, d(2024, 2, 20)).unwrap().posted_count(), 0);
  with_conn(&db, |conn| {
    assert_eq!(list_transactions(conn, TransactionKind::Income)?.len(), 2);
    assert_eq!(get_recurring_definition(conn, id)?.last_processed, Some(d(2024, 2, 15)));
    Ok(())
  })
  .unwrap();
}

#[test]
fn monthly_follows_a_manually_moved_marker() {
  let db = Db::open_in_memory().unwrap();
  let id = add_definition(&db, TransactionKind::Income, 500.0, d(2024, 1, 15), Frequency::Monthly);
  assert!(with_conn(&db, |conn| update_last_processed(conn, id, d(2024, 2, 20))).unwrap());

  assert_eq!(sync(&db, d(2024, 3, 15)).unwrap().posted_count(), 0);
  let report = sync(&db, d(2024, 3, 20)).unwrap();
  assert_eq!(report.posted_count(), 1);
  assert_eq!(report.posted[0].date, d(2024, 3, 20));
}

#[test]
fn weekly_posts_only_on_seven_day_steps() {
  let db = Db::open_in_memory().unwrap();
  add_definition(&db, TransactionKind::Expense, 25.0, d(2024, 1, 1), Frequency::Weekly);

  let posted: Vec<usize> = [d(2024, 1, 1), d(2024, 1, 8), d(2024, 1, 10), d(2024, 1, 15)]
    .into_iter()
    .map(|as_of| sync(&db, as_of).unwrap().posted_count())
    .collect();
  assert_eq!(posted, vec![1, 1, 0, 1]);
}

#[test]
fn month_end_start_clamps_and_keeps_its_anchor() {
  let db = Db::open_in_memory().unwrap();
  let id = add_definition(&db, TransactionKind::Expense, 80.0, d(2024, 1, 31), Frequency::Monthly);

  let mut dates = Vec::new();
  let mut day = d(2024, 1, 31);
  while day <= d(2024, 5, 31) {
    for posting in sync(&db, day).unwrap().posted {
      dates.push(posting.date);
    }
    day = day.succ_opt().unwrap();
  }

  assert_eq!(
    dates,
    vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31), d(2024, 4, 30), d(2024, 5, 31)]
  );
  let definition = with_conn(&db, |conn| get_recurring_definition(conn, id)).unwrap();
  assert_eq!(definition.last_processed, Some(d(2024, 5, 31)));
}

#[test]
fn daily_catches_up_once_per_sync_not_per_missed_day() {
  let db = Db::open_in_memory().unwrap();
  add_definition(&db, TransactionKind::Expense, 2.0, d(2024, 1, 1), Frequency::Daily);

  assert_eq!(sync(&db, d(2024, 1, 10)).unwrap().posted_count(), 1);
  assert_eq!(sync(&db, d(2024, 1, 10)).unwrap().posted_count(), 0);
  let total = with_conn(&db, |conn| total_amount(conn, TransactionKind::Expense)).unwrap();
  assert_eq!(total, 2.0);
}

#[test]
fn last_processed_is_never_before_start() {
  let db = Db::open_in_memory().unwrap();
  let ids = [
    add_definition(&db, TransactionKind::Income, 5.0, d(2024, 3, 1), Frequency::Daily),
    add_definition(&db, TransactionKind::Income, 5.0, d(2024, 3, 1), Frequency::Weekly),
    add_definition(&db, TransactionKind::Income, 5.0, d(2024, 3, 1), Frequency::Monthly),
    add_definition(&db, TransactionKind::Income, 5.0, d(2024, 3, 1), Frequency::Yearly),
  ];

  for as_of in [d(2024, 2, 1), d(2024, 3, 1), d(2024, 3, 8), d(2025, 3, 1)] {
    sync(&db, as_of).unwrap();
  }

  with_conn(&db, |conn| {
    for id in ids {
      let definition = get_recurring_definition(conn, id)?;
      let last = definition.last_processed.expect("posted at least once");
      assert!(last >= definition.start_date);
    }
    Ok(())
  })
  .unwrap();
}

#[test]
fn totals_include_engine_postings_and_drop_deleted_rows() {
  let db = Db::open_in_memory().unwrap();
  add_definition(&db, TransactionKind::Income, 1200.0, d(2024, 1, 15), Frequency::Monthly);
  let manual = with_conn(&db, |conn| {
    insert_transaction(conn, TransactionKind::Income, d(2024, 1, 20), "Side job", 300.0)
  })
  .unwrap();

  sync(&db, d(2024, 1, 15)).unwrap();
  sync(&db, d(2024, 2, 15)).unwrap();

  with_conn(&db, |conn| {
    assert_eq!(total_amount(conn, TransactionKind::Income)?, 2700.0);
    delete_transaction(conn, TransactionKind::Income, manual)?;
    assert_eq!(total_amount(conn, TransactionKind::Income)?, 2400.0);

    let months = monthly_totals(conn)?;
    assert_eq!(months.len(), 2);
    assert_eq!(months[0].month, "2024-01");
    assert_eq!(months[0].total_income, 1200.0);
    assert_eq!(months[1].month, "2024-02");
    Ok(())
  })
  .unwrap();
}

#[test]
fn postings_survive_reopening_the_store() {
  let dir = tempdir().unwrap();
  {
    let db = init_db(dir.path()).unwrap();
    add_definition(&db, TransactionKind::Expense, 60.0, d(2024, 6, 1), Frequency::Monthly);
    assert_eq!(sync(&db, d(2024, 6, 1)).unwrap().posted_count(), 1);
  }

  let db = init_db(dir.path()).unwrap();
  assert_eq!(sync(&db, d(2024, 6, 1)).unwrap().posted_count(), 0);
  let expenses = with_conn(&db, |conn| list_transactions(conn, TransactionKind::Expense)).unwrap();
  assert_eq!(expenses.len(), 1);
  assert_eq!(expenses[0].date, d(2024, 6, 1));
}
