//! Push transports feeding the stream client

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::debug;

use msgdeck_config::ServerConfig;
use msgdeck_protocol::endpoints::EVENTS_STREAM;

use super::sse::{SseDecoder, SseMessage};
use crate::error::TransportError;
use crate::http::{create_stream_client, endpoint};

/// Frames of one open connection. An `Err` item, or the end of the stream,
/// means the connection is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<SseMessage, TransportError>> + Send>>;

/// Opens server push connections.
///
/// A successful `connect` is the transport-level "open" signal; it promises
/// nothing about whether frames will actually arrive.
#[async_trait]
pub trait EventTransport: Send + Sync + 'static {
  async fn connect(&self) -> Result<FrameStream, TransportError>;
}

/// `GET /api/events/stream` over reqwest.
#[derive(Debug, Clone)]
pub struct SseTransport {
  client: Client,
  url: String,
}

impl SseTransport {
  pub fn new(base_url: &str, client: Client) -> Self {
    Self {
      client,
      url: endpoint(base_url, EVENTS_STREAM),
    }
  }

  pub fn from_config(config: &ServerConfig) -> Self {
    Self::new(&config.base_url, create_stream_client())
  }

  pub fn url(&self) -> &str {
    &self.url
  }
}

#[async_trait]
impl EventTransport for SseTransport {
  async fn connect(&self) -> Result<FrameStream, TransportError> {
    let response = self
      .client
      .get(&self.url)
      .header(ACCEPT, "text/event-stream")
      .header(CACHE_CONTROL, "no-cache")
      .send()
      .await
      .map_err(TransportError::Connect)?;

    let status = response.status();
    if !status.is_success() {
      return Err(TransportError::Status {
        status: status.as_u16(),
      });
    }
    debug!(url = %self.url, "event stream opened");

    Ok(Box::pin(async_stream::stream! {
      let mut body = response.bytes_stream();
      let mut decoder = SseDecoder::new();

      while let Some(chunk) = body.next().await {
        match chunk {
          Ok(bytes) => {
            for message in decoder.push_bytes(&bytes) {
              yield Ok(message);
            }
          }
          Err(err) => {
            yield Err(TransportError::Body(err));
            return;
          }
        }
      }
      yield Err(TransportError::Closed);
    }))
  }
}
