use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::NaiveDate;

use crate::db::Db;
use crate::error::AppError;
use crate::recurrence;

/// Source of the "today" date handed to each sync pass.
pub trait Clock: Send + 'static {
  fn today(&self) -> NaiveDate;
}

/// Calendar date in the machine's local time zone.
pub struct LocalClock;

impl Clock for LocalClock {
  fn today(&self) -> NaiveDate {
    chrono::Local::now().date_naive()
  }
}

/// Background thread that runs a sync pass at startup and then on a fixed interval.
/// Passes never overlap. Dropping the handle stops the thread.
pub struct Scheduler {
  stop_tx: Option<Sender<()>>,
  handle: Option<JoinHandle<()>>,
}

impl Scheduler {
  pub fn start<C: Clock>(db: Arc<Db>, interval: Duration, clock: C) -> Result<Self, AppError> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let handle = std::thread::Builder::new()
      .name("recurrence-sync".to_string())
      .spawn(move || {
        tracing::info!(interval_secs = interval.as_secs_f64(), "recurrence scheduler started");
        loop {
          let as_of = clock.today();
          if let Err(err) = recurrence::sync(&db, as_of) {
            tracing::error!(%as_of, error = %err, "scheduled sync failed");
          }
          match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
          }
        }
        tracing::info!("recurrence scheduler stopped");
      })?;

    Ok(Scheduler {
      stop_tx: Some(stop_tx),
      handle: Some(handle),
    })
  }

  /// Waits for a running pass to finish, then ends the thread.
  pub fn stop(mut self) {
    self.shutdown();
  }

  fn shutdown(&mut self) {
    if let Some(stop_tx) = self.stop_tx.take() {
      let _ = stop_tx.send(());
    }
    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        tracing::error!("recurrence scheduler thread panicked");
      }
    }
  }
}

impl Drop for Scheduler {
  fn drop(&mut self) {
    self.shutdown();
  }
}
