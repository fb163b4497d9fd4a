use serde::Serialize;

pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
pub const CODE_DB: &str = "DB_ERROR";
pub const CODE_IO: &str = "IO_ERROR";
pub const CODE_LOCK: &str = "LOCK_ERROR";
pub const CODE_PATH: &str = "PATH";

/// Coarse classification the host uses to decide how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Rejected input, no state was changed.
  Validation,
  NotFound,
  /// Storage is unavailable or broken; the current operation was aborted.
  Persistence,
}

#[derive(Debug, Serialize)]
pub struct AppError {
  pub code: String,
  pub message: String,
}

impl AppError {
  pub fn new(code: &str, message: impl Into<String>) -> Self {
    Self {
      code: code.to_string(),
      message: message.into(),
    }
  }

  pub fn not_found(entity: &str, id: i64) -> Self {
    AppError::new(CODE_NOT_FOUND, format!("{entity} {id} not found"))
  }

  pub fn kind(&self) -> ErrorKind {
    match self.code.as_str() {
      CODE_NOT_FOUND => ErrorKind::NotFound,
      CODE_DB | CODE_IO | CODE_LOCK | CODE_PATH => ErrorKind::Persistence,
      _ => ErrorKind::Validation,
    }
  }
}

impl std::fmt::Display for AppError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.code, self.message)
  }
}

impl std::error::Error for AppError {}

impl From<rusqlite::Error> for AppError {
  fn from(err: rusqlite::Error) -> Self {
    match err {
      rusqlite::Error::QueryReturnedNoRows => AppError::new(CODE_NOT_FOUND, "no matching row"),
      other => AppError::new(CODE_DB, other.to_string()),
    }
  }
}

impl From<std::io::Error> for AppError {
  fn from(err: std::io::Error) -> Self {
    AppError::new(CODE_IO, err.to_string())
  }
}

impl<T> From<std::sync::PoisonError<T>> for AppError {
  fn from(_: std::sync::PoisonError<T>) -> Self {
    AppError::new(CODE_LOCK, "Database lock failed")
  }
}
