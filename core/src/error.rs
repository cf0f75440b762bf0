//! Client error types

use std::fmt;

use thiserror::Error;

/// Backend operation a [`ControlError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
  Start,
  Stop,
  Reset,
  Status,
}

impl fmt::Display for ControlCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      ControlCommand::Start => "start",
      ControlCommand::Stop => "stop",
      ControlCommand::Reset => "reset",
      ControlCommand::Status => "status",
    })
  }
}

/// Failure of a control or status call
#[derive(Error, Debug)]
pub enum ControlError {
  /// Backend answered with a non-success status
  #[error("{command} rejected: HTTP {status}: {body}")]
  CommandRejected {
    command: ControlCommand,
    status: u16,
    body: String,
  },

  /// Request never got an answer
  #[error("network error: {0}")]
  Network(#[from] reqwest::Error),

  /// Status body did not match the expected shape
  #[error("invalid status response: {0}")]
  Decode(#[from] serde_json::Error),
}

impl ControlError {
  pub fn is_rejected(&self) -> bool {
    matches!(self, ControlError::CommandRejected { .. })
  }

  /// HTTP status of a rejected command.
  pub fn status(&self) -> Option<u16> {
    match self {
      ControlError::CommandRejected { status, .. } => Some(*status),
      _ => None,
    }
  }
}

/// Alias for Result<T, ControlError>
pub type Result<T> = std::result::Result<T, ControlError>;

/// Transport-level failure of the event stream.
///
/// Never handed to consumers of the stream client: it is logged and turned
/// into a disconnect followed by a reconnect.
#[derive(Error, Debug)]
pub enum TransportError {
  #[error("failed to open event stream: {0}")]
  Connect(#[source] reqwest::Error),

  #[error("event stream refused: HTTP {status}")]
  Status { status: u16 },

  #[error("event stream read failed: {0}")]
  Body(#[source] reqwest::Error),

  #[error("event stream closed by server")]
  Closed,
}
