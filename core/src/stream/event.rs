//! Stream events and frame classification

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use msgdeck_protocol::HEARTBEAT_EVENT_TYPE;

/// One entry of the event log.
///
/// `id` is minted here on ingestion; an `id` sent by the server stays in the
/// payload and is never trusted as identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEvent {
  pub id: Uuid,
  #[serde(flatten)]
  pub body: EventBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventBody {
  /// Decoded JSON object, passed through as received.
  Data(Map<String, Value>),
  /// Frame that did not decode to a JSON object.
  Raw { message: String, timestamp: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
  Data,
  Raw,
}

impl StreamEvent {
  pub fn data(payload: Map<String, Value>) -> Self {
    Self {
      id: Uuid::new_v4(),
      body: EventBody::Data(payload),
    }
  }

  pub fn raw(message: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4(),
      body: EventBody::Raw {
        message: message.into(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      },
    }
  }

  pub fn kind(&self) -> EventKind {
    match self.body {
      EventBody::Data(_) => EventKind::Data,
      EventBody::Raw { .. } => EventKind::Raw,
    }
  }

  /// The payload's `type`, or `"raw"` for undecoded frames.
  pub fn event_type(&self) -> Option<&str> {
    match &self.body {
      EventBody::Data(payload) => payload.get("type").and_then(Value::as_str),
      EventBody::Raw { .. } => Some("raw"),
    }
  }

  pub fn message(&self) -> Option<&str> {
    match &self.body {
      EventBody::Data(payload) => payload.get("message").and_then(Value::as_str),
      EventBody::Raw { message, .. } => Some(message),
    }
  }

  /// Server timestamp for data events, ingestion time for raw ones.
  pub fn timestamp(&self) -> Option<&str> {
    match &self.body {
      EventBody::Data(payload) => payload.get("timestamp").and_then(Value::as_str),
      EventBody::Raw { timestamp, .. } => Some(timestamp),
    }
  }

  pub fn payload(&self) -> Option<&Map<String, Value>> {
    match &self.body {
      EventBody::Data(payload) => Some(payload),
      EventBody::Raw { .. } => None,
    }
  }
}

/// What a single inbound frame amounts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingest {
  /// Liveness only; never logged.
  Heartbeat,
  Event(StreamEvent),
}

/// Decodes a frame payload.
///
/// Only a JSON object counts as a data event. Anything else, including valid
/// JSON scalars and arrays, is kept verbatim as a raw event.
pub fn classify(data: &str) -> Ingest {
  match serde_json::from_str::<Value>(data) {
    Ok(Value::Object(payload)) => {
      if payload.get("type").and_then(Value::as_str) == Some(HEARTBEAT_EVENT_TYPE) {
        Ingest::Heartbeat
      } else {
        Ingest::Event(StreamEvent::data(payload))
      }
    }
    Ok(_) | Err(_) => Ingest::Event(StreamEvent::raw(data)),
  }
}
