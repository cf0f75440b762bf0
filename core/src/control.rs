//! Run control client
//!
//! Issues start/stop/reset commands and reads run status over the backend's
//! HTTP control surface. Every call reports plain success or failure; a
//! non-2xx answer becomes [`ControlError::CommandRejected`] carrying the
//! backend's status and body untouched.

use reqwest::{Client, Response};
use serde::Serialize;
use tracing::{info, warn};

use msgdeck_config::ServerConfig;
use msgdeck_protocol::endpoints::{RUN_RESET, RUN_START, RUN_STATUS, RUN_STOP};
use msgdeck_protocol::{ResetRequest, RunConfig, RunStatusSnapshot};

use crate::error::{ControlCommand, ControlError, Result};
use crate::http::{create_client, endpoint};

/// Client for `/api/run/*`.
#[derive(Debug, Clone)]
pub struct RunControlClient {
  client: Client,
  base_url: String,
}

impl RunControlClient {
  pub fn new(base_url: impl Into<String>, client: Client) -> Self {
    Self {
      client,
      base_url: base_url.into(),
    }
  }

  pub fn from_config(config: &ServerConfig) -> Self {
    Self::new(
      config.base_url.clone(),
      create_client(config.request_timeout(), config.connect_timeout()),
    )
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Starts a run, either from explicit parameters or a named scenario.
  pub async fn start(&self, config: &RunConfig) -> Result<()> {
    self.post(ControlCommand::Start, RUN_START, Some(config)).await?;
    match config {
      RunConfig::Scenario { scenario } => info!(%scenario, "run started"),
      RunConfig::Custom(custom) => info!(
        worker_threads = custom.worker_threads,
        queue_capacity = custom.queue_capacity,
        processing_delay_ms = custom.processing_delay_ms,
        message_count = custom.message_count,
        "custom run started"
      ),
    }
    Ok(())
  }

  pub async fn stop(&self) -> Result<()> {
    self.post::<()>(ControlCommand::Stop, RUN_STOP, None).await?;
    info!("run stopped");
    Ok(())
  }

  /// Resets the backend; `delete_disk_queue_file` also purges the on-disk queue.
  pub async fn reset(&self, delete_disk_queue_file: bool) -> Result<()> {
    let body = ResetRequest {
      delete_disk_queue_file,
    };
    self.post(ControlCommand::Reset, RUN_RESET, Some(&body)).await?;
    info!(delete_disk_queue_file, "run reset");
    Ok(())
  }

  pub async fn fetch_status(&self) -> Result<RunStatusSnapshot> {
    let response = self
      .client
      .get(endpoint(&self.base_url, RUN_STATUS))
      .send()
      .await?;
    let response = check(ControlCommand::Status, response).await?;
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
  }

  async fn post<T: Serialize + ?Sized>(
    &self,
    command: ControlCommand,
    path: &str,
    body: Option<&T>,
  ) -> Result<Response> {
    let mut request = self.client.post(endpoint(&self.base_url, path));
    if let Some(body) = body {
      request = request.json(body);
    }
    let response = request.send().await?;
    check(command, response).await
  }
}

async fn check(command: ControlCommand, response: Response) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  warn!(%command, status = status.as_u16(), %body, "backend rejected command");
  Err(ControlError::CommandRejected {
    command,
    status: status.as_u16(),
    body,
  })
}
