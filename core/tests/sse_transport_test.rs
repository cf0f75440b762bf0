use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msgdeck_core::http::create_stream_client;
use msgdeck_core::stream::sse::SseMessage;
use msgdeck_core::{
  EventKind, EventStreamClient, EventTransport, SseTransport, StreamSettings, TransportError,
};

const BODY: &str = concat!(
  ": connected\n\n",
  "retry: 2000\n",
  "data: {\"type\":\"heartbeat\"}\n\n",
  "event: message\n",
  "data: {\"type\":\"run\",\"message\":\"started\",\"id\":7}\n\n",
  "data: oops\n\n",
);

async fn mount_stream(server: &MockServer, body: &str) {
  Mock::given(method("GET"))
    .and(path("/api/events/stream"))
    .and(header("accept", "text/event-stream"))
    .respond_with(
      ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream"),
    )
    .mount(server)
    .await;
}

fn transport_for(server: &MockServer) -> SseTransport {
  SseTransport::new(&server.uri(), create_stream_client())
}

#[tokio::test]
async fn decodes_frames_then_reports_close() {
  let server = MockServer::start().await;
  mount_stream(&server, BODY).await;

  let transport = transport_for(&server);
  assert_eq!(transport.url(), format!("{}/api/events/stream", server.uri()));
  let mut frames = transport.connect().await.expect("stream opened");

  let mut data = Vec::new();
  let mut retry = None;
  let ended = loop {
    match frames.next().await {
      Some(Ok(SseMessage::Event(event))) => data.push(event.data),
      Some(Ok(SseMessage::Retry(delay))) => retry = Some(delay),
      Some(Err(err)) => break Some(err),
      None => break None,
    }
  };

  assert_eq!(
    data,
    vec![
      r#"{"type":"heartbeat"}"#.to_string(),
      r#"{"type":"run","message":"started","id":7}"#.to_string(),
      "oops".to_string(),
    ]
  );
  assert_eq!(retry, Some(Duration::from_millis(2000)));
  assert!(matches!(ended, Some(TransportError::Closed)));
}

#[tokio::test]
async fn refused_stream_is_a_status_error() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/events/stream"))
    .respond_with(ResponseTemplate::new(503))
    .mount(&server)
    .await;

  let result = transport_for(&server).connect().await;
  assert!(matches!(result, Err(TransportError::Status { status: 503 })));
}

#[tokio::test]
async fn unreachable_backend_is_a_connect_error() {
  let transport = SseTransport::new("http://127.0.0.1:1", create_stream_client());
  let result = transport.connect().await;
  assert!(matches!(result, Err(TransportError::Connect(_))));
}

#[tokio::test]
async fn client_logs_frames_and_reconnects_after_server_close() {
  let server = MockServer::start().await;
  let body = "data: {\"type\":\"heartbeat\"}\n\ndata: {\"type\":\"run\"}\n\ndata: oops\n\n";
  mount_stream(&server, body).await;

  let settings = StreamSettings {
    reconnect_delay: Duration::from_millis(50),
    ..StreamSettings::default()
  };
  let mut client = EventStreamClient::new(Arc::new(transport_for(&server)), settings);
  let mut events = client.subscribe_events();
  client.start();

  // Each connection delivers two loggable frames; four means a reconnect happened.
  let log = tokio::time::timeout(Duration::from_secs(10), events.wait_for(|log| log.len() >= 4))
    .await
    .expect("reconnected in time")
    .expect("driver alive")
    .clone();
  client.shutdown().await;

  let head = log.head().expect("head");
  assert_eq!(head.kind(), EventKind::Raw);
  assert_eq!(head.message(), Some("oops"));
  assert_eq!(log.get(1).and_then(|e| e.event_type()), Some("run"));
  assert!(log.iter().all(|e| e.event_type() != Some("heartbeat")));

  let requests = server.received_requests().await.expect("recording on");
  assert!(requests.len() >= 2);
}
