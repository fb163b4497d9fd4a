//! Budget ledger core: a SQLite store for income and expense transactions and
//! an engine that posts recurring transactions when they fall due.

pub mod audit;
pub mod db;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod recurrence;
pub mod recurring;
pub mod reports;
pub mod scheduler;
pub mod settings;
pub mod users;
