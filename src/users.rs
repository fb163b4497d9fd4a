//! Credential store backing the host's login gate.

use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;

use crate::audit::log::append_audit;
use crate::error::AppError;

pub const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_PASSWORD: &str = "admin";

/// Returns `false` when the username is already taken.
pub fn create_user(conn: &mut Connection, username: &str, password: &str) -> Result<bool, AppError> {
  let username = username.trim();
  if username.is_empty() || password.is_empty() {
    return Err(AppError::new("INVALID_CREDENTIALS", "username and password must not be empty"));
  }

  let password_hash = hash_password(password)?;
  let tx = conn.transaction()?;
  let inserted = tx.execute(
    "INSERT OR IGNORE INTO users (username, password_hash) VALUES (?1, ?2)",
    params![username, password_hash],
  )?;
  if inserted == 0 {
    return Ok(false);
  }

  let id = tx.last_insert_rowid();
  append_audit(
    &tx,
    "CREATE_USER",
    "USER",
    Some(id.to_string()),
    json!({ "username": username }).to_string(),
  )?;
  tx.commit()?;
  Ok(true)
}

pub fn check_user(conn: &Connection, username: &str, password: &str) -> Result<bool, AppError> {
  let stored: Option<String> = conn
    .query_row(
      "SELECT password_hash FROM users WHERE username = ?1",
      params![username.trim()],
      |row| row.get(0),
    )
    .optional()?;

  let Some(stored) = stored else {
    return Ok(false);
  };
  let Ok(parsed) = PasswordHash::new(&stored) else {
    tracing::warn!(username, "stored password hash is not a PHC string");
    return Ok(false);
  };
  Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Seeds the default account on a store with no users.
pub fn ensure_default_user(conn: &mut Connection) -> Result<(), AppError> {
  let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
  if count > 0 {
    return Ok(());
  }
  create_user(conn, DEFAULT_USERNAME, DEFAULT_PASSWORD)?;
  tracing::info!(username = DEFAULT_USERNAME, "created default user");
  Ok(())
}

fn hash_password(password: &str) -> Result<String, AppError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|err| AppError::new("INVALID_CREDENTIALS", format!("password hashing failed: {err}")))
}
