use rusqlite::{params, Connection};

use crate::audit::log::append_audit;
use crate::error::AppError;
use crate::models::Settings;

const KEY_SYNC_INTERVAL: &str = "sync_interval_secs";
const KEY_CURRENCY_SYMBOL: &str = "currency_symbol";

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CURRENCY_SYMBOL: &str = "£";

impl Default for Settings {
  fn default() -> Self {
    Settings {
      sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
      currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
    }
  }
}

pub fn ensure_defaults(conn: &Connection) -> Result<(), AppError> {
  conn.execute(
    "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_SYNC_INTERVAL, DEFAULT_SYNC_INTERVAL_SECS.to_string()],
  )?;
  conn.execute(
    "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_CURRENCY_SYMBOL, DEFAULT_CURRENCY_SYMBOL],
  )?;
  Ok(())
}

pub fn get_settings(conn: &Connection) -> Result<Settings, AppError> {
  let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
  let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

  let mut settings = Settings::default();

  for row in rows {
    let (key, value) = row?;
    match key.as_str() {
      KEY_SYNC_INTERVAL => {
        settings.sync_interval_secs = value
          .parse::<u64>()
          .ok()
          .filter(|secs| *secs > 0)
          .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
      }
      KEY_CURRENCY_SYMBOL => {
        settings.currency_symbol = value;
      }
      _ => {}
    }
  }

  Ok(settings)
}

pub fn update_settings(conn: &mut Connection, settings: &Settings) -> Result<(), AppError> {
  if settings.sync_interval_secs == 0 {
    return Err(AppError::new("INVALID_SETTING", "sync interval must be at least 1 second"));
  }

  let tx = conn.transaction()?;
  tx.execute(
    "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_SYNC_INTERVAL, settings.sync_interval_secs.to_string()],
  )?;
  tx.execute(
    "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_CURRENCY_SYMBOL, settings.currency_symbol.clone()],
  )?;
  append_audit(
    &tx,
    "UPDATE_SETTINGS",
    "SETTINGS",
    None,
    serde_json::to_string(settings).unwrap_or_else(|_| "{}".to_string()),
  )?;
  tx.commit()?;
  Ok(())
}
