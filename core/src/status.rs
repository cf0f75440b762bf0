//! Periodic run status polling
//!
//! The poller keeps a best-effort copy of the backend's run status. A failed
//! fetch leaves the previous snapshot in place and the next tick simply
//! tries again; nothing is surfaced to observers except fresh snapshots.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::debug;

use msgdeck_config::StatusConfig;
use msgdeck_protocol::RunStatusSnapshot;

use crate::control::RunControlClient;
use crate::error::Result;

/// Anything that can report the current run status.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
  async fn fetch_status(&self) -> Result<RunStatusSnapshot>;
}

#[async_trait]
impl StatusSource for RunControlClient {
  async fn fetch_status(&self) -> Result<RunStatusSnapshot> {
    RunControlClient::fetch_status(self).await
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSettings {
  pub poll_interval: Duration,
}

impl Default for StatusSettings {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_secs(5),
    }
  }
}

impl From<&StatusConfig> for StatusSettings {
  fn from(config: &StatusConfig) -> Self {
    Self {
      poll_interval: Duration::from_millis(config.poll_interval_ms),
    }
  }
}

/// Handle to a running poll loop.
///
/// Dropping the handle aborts the loop.
pub struct StatusPoller {
  snapshot: watch::Receiver<Option<RunStatusSnapshot>>,
  cancel: CancellationToken,
  task: AbortOnDropHandle<()>,
}

impl StatusPoller {
  /// Fetches once immediately, then every `poll_interval`.
  pub fn spawn<S: StatusSource>(source: Arc<S>, settings: StatusSettings) -> Self {
    let (tx, snapshot) = watch::channel(None);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(poll_loop(source, settings, tx, cancel.clone()));
    Self {
      snapshot,
      cancel,
      task: AbortOnDropHandle::new(task),
    }
  }

  /// `None` until the first successful fetch.
  pub fn subscribe(&self) -> watch::Receiver<Option<RunStatusSnapshot>> {
    self.snapshot.clone()
  }

  pub fn latest(&self) -> Option<RunStatusSnapshot> {
    self.snapshot.borrow().clone()
  }

  /// Stops polling; a response still in flight is discarded.
  pub fn stop(&self) {
    self.cancel.cancel();
  }

  /// Stops polling and waits for the loop to exit.
  pub async fn shutdown(self) {
    self.cancel.cancel();
    let _ = self.task.await;
  }
}

async fn poll_loop<S: StatusSource>(
  source: Arc<S>,
  settings: StatusSettings,
  tx: watch::Sender<Option<RunStatusSnapshot>>,
  cancel: CancellationToken,
) {
  let mut ticker = interval(settings.poll_interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => break,
      _ = ticker.tick() => {}
    }

    let result = tokio::select! {
      biased;
      _ = cancel.cancelled() => break,
      result = source.fetch_status() => result,
    };
    if cancel.is_cancelled() {
      break;
    }

    match result {
      Ok(snapshot) => {
        tx.send_replace(Some(snapshot));
      }
      Err(err) => debug!(error = %err, "status poll failed, keeping previous snapshot"),
    }
  }
  debug!("status poller stopped");
}
