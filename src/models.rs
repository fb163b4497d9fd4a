use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
  Income,
  Expense,
}

impl TransactionKind {
  pub const ALL: [TransactionKind; 2] = [TransactionKind::Income, TransactionKind::Expense];

  pub fn as_str(self) -> &'static str {
    match self {
      TransactionKind::Income => "income",
      TransactionKind::Expense => "expense",
    }
  }

  /// Ledger table holding rows of this kind. The only place table names are produced.
  pub fn table(self) -> &'static str {
    match self {
      TransactionKind::Income => "income",
      TransactionKind::Expense => "expenses",
    }
  }
}

impl std::fmt::Display for TransactionKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
  Daily,
  Weekly,
  Monthly,
  Yearly,
}

impl Frequency {
  pub fn as_str(self) -> &'static str {
    match self {
      Frequency::Daily => "daily",
      Frequency::Weekly => "weekly",
      Frequency::Monthly => "monthly",
      Frequency::Yearly => "yearly",
    }
  }
}

impl std::fmt::Display for Frequency {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Transaction {
  pub id: i64,
  pub kind: TransactionKind,
  pub date: NaiveDate,
  pub description: String,
  pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecurringDefinition {
  pub id: i64,
  pub kind: TransactionKind,
  pub description: String,
  pub amount: f64,
  pub start_date: NaiveDate,
  pub frequency: Frequency,
  pub last_processed: Option<NaiveDate>,
}

impl RecurringDefinition {
  /// Last-processed date, or the start date when the definition never posted.
  pub fn reference_date(&self) -> NaiveDate {
    self.last_processed.unwrap_or(self.start_date)
  }
}

/// A `recurring_transactions` row exactly as stored, before validation.
#[derive(Debug, Clone)]
pub struct RecurringRow {
  pub id: i64,
  pub kind: String,
  pub description: String,
  pub amount: f64,
  pub start_date: String,
  pub frequency: String,
  pub last_processed: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MonthlyTotal {
  pub month: String,
  pub total_income: f64,
  pub total_expense: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Summary {
  pub total_income: f64,
  pub total_expense: f64,
  pub net_balance: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
  pub sync_interval_secs: u64,
  pub currency_symbol: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLogEntry {
  pub id: i64,
  pub ts: String,
  pub action: String,
  pub entity_type: String,
  pub entity_id: Option<String>,
  pub payload_json: String,
}
