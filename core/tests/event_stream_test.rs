use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

use msgdeck_core::stream::sse::{SseEvent, SseMessage};
use msgdeck_core::stream::transport::FrameStream;
use msgdeck_core::{
  ConnectionPhase, ConnectionState, EventKind, EventLogSnapshot, EventStreamClient, EventTransport,
  StreamSettings, TransportError,
};

type Feed = mpsc::UnboundedSender<Result<SseMessage, TransportError>>;

/// Hands out pre-arranged connections in order; once they run out every
/// connect attempt is refused.
#[derive(Default)]
struct ScriptedTransport {
  links: Mutex<VecDeque<UnboundedReceiverStream<Result<SseMessage, TransportError>>>>,
  attempts: AtomicUsize,
}

impl ScriptedTransport {
  fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Queues one connection and returns the sender that feeds it.
  fn add_link(&self) -> Feed {
    let (tx, rx) = mpsc::unbounded_channel();
    self
      .links
      .lock()
      .expect("links lock")
      .push_back(UnboundedReceiverStream::new(rx));
    tx
  }

  fn attempts(&self) -> usize {
    self.attempts.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
  async fn connect(&self) -> Result<FrameStream, TransportError> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    let next = self.links.lock().expect("links lock").pop_front();
    match next {
      Some(stream) => Ok(Box::pin(stream)),
      None => Err(TransportError::Status { status: 503 }),
    }
  }
}

fn frame(data: &str) -> Result<SseMessage, TransportError> {
  Ok(SseMessage::Event(SseEvent {
    event: "message".to_string(),
    data: data.to_string(),
    id: None,
  }))
}

fn heartbeat() -> Result<SseMessage, TransportError> {
  frame(r#"{"type":"heartbeat"}"#)
}

async fn wait_connected(rx: &mut watch::Receiver<ConnectionState>) {
  rx.wait_for(|state| state.phase == ConnectionPhase::Connected)
    .await
    .expect("driver alive");
}

async fn wait_disconnected(rx: &mut watch::Receiver<ConnectionState>) {
  rx.wait_for(|state| state.phase == ConnectionPhase::Disconnected)
    .await
    .expect("driver alive");
}

async fn wait_log_len(rx: &mut watch::Receiver<EventLogSnapshot>, len: usize) -> EventLogSnapshot {
  rx.wait_for(|log| log.len() == len)
    .await
    .expect("driver alive")
    .clone()
}

/// Sends a frame and waits until the driver has taken it in.
async fn send_and_wait_liveness(
  feed: &Feed,
  rx: &mut watch::Receiver<ConnectionState>,
  message: Result<SseMessage, TransportError>,
) {
  let now = Instant::now();
  feed.send(message).expect("feed open");
  rx.wait_for(|state| state.last_liveness_at == Some(now))
    .await
    .expect("driver alive");
}

#[tokio::test(start_paused = true)]
async fn progress_heartbeat_and_malformed_frames() {
  let transport = ScriptedTransport::new();
  let feed = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();
  let mut events = client.subscribe_events();

  client.start();
  wait_connected(&mut connection).await;

  feed.send(frame(r#"{"type":"progress","message":"10/30"}"#)).expect("feed open");
  let log = wait_log_len(&mut events, 1).await;
  let head = log.head().expect("one event");
  assert_eq!(head.kind(), EventKind::Data);
  assert_eq!(head.event_type(), Some("progress"));
  assert_eq!(head.message(), Some("10/30"));

  feed.send(heartbeat()).expect("feed open");
  feed.send(frame("oops")).expect("feed open");
  let log = wait_log_len(&mut events, 2).await;
  let head = log.head().expect("head");
  assert_eq!(head.kind(), EventKind::Raw);
  assert_eq!(head.message(), Some("oops"));
  assert_eq!(log.get(1).and_then(|e| e.message()), Some("10/30"));
  assert!(log.iter().all(|e| e.event_type() != Some("heartbeat")));

  assert!(client.is_connected());
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn log_is_capped_and_evicts_oldest_first() {
  let transport = ScriptedTransport::new();
  let feed = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut events = client.subscribe_events();
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  for n in 0..350 {
    feed
      .send(frame(&format!(r#"{{"type":"progress","message":"{n}"}}"#)))
      .expect("feed open");
  }

  let log = events
    .wait_for(|log| log.head().and_then(|e| e.message()) == Some("349"))
    .await
    .expect("driver alive")
    .clone();
  assert_eq!(log.len(), 300);
  assert_eq!(log.iter().last().and_then(|e| e.message()), Some("50"));
  let messages: Vec<u32> = log
    .iter()
    .filter_map(|e| e.message())
    .filter_map(|m| m.parse().ok())
    .collect();
  assert!(messages.windows(2).all(|pair| pair[0] == pair[1] + 1));

  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn heartbeats_keep_connection_alive() {
  let transport = ScriptedTransport::new();
  let feed = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  send_and_wait_liveness(&feed, &mut connection, heartbeat()).await;

  for _ in 0..10 {
    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(client.is_connected());
    send_and_wait_liveness(&feed, &mut connection, heartbeat()).await;
  }

  assert!(client.is_connected());
  assert!(client.events().is_empty());
  assert_eq!(transport.attempts(), 1);
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn silence_forces_disconnect_without_transport_error() {
  let transport = ScriptedTransport::new();
  let feed = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  let last_frame = Instant::now();
  let started = frame(r#"{"type":"run","message":"started"}"#);
  send_and_wait_liveness(&feed, &mut connection, started).await;

  wait_disconnected(&mut connection).await;
  let silence = last_frame.elapsed();
  assert!(silence > Duration::from_secs(5), "disconnected after {silence:?}");
  assert!(silence <= Duration::from_secs(6), "disconnected after {silence:?}");

  // The silent transport was closed even though it never reported an error.
  assert!(feed.is_closed());
  assert_eq!(client.events().len(), 1);

  // A fresh transport is opened after the reconnect delay.
  let second = transport.add_link();
  wait_connected(&mut connection).await;
  assert_eq!(transport.attempts(), 2);
  assert!(!second.is_closed());

  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn watchdog_waits_for_first_frame() {
  let transport = ScriptedTransport::new();
  let _feed = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  tokio::time::sleep(Duration::from_secs(30)).await;

  assert!(client.is_connected());
  assert_eq!(transport.attempts(), 1);
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reopened_silent_transport_is_dropped_again() {
  let transport = ScriptedTransport::new();
  let first = transport.add_link();
  let second = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  send_and_wait_liveness(&first, &mut connection, frame(r#"{"type":"run"}"#)).await;
  wait_disconnected(&mut connection).await;

  // The reopened transport never sends anything.
  wait_connected(&mut connection).await;
  let reopened_at = Instant::now();
  wait_disconnected(&mut connection).await;
  let silence = reopened_at.elapsed();
  assert!(silence > Duration::from_secs(5), "disconnected after {silence:?}");
  assert!(silence <= Duration::from_secs(6), "disconnected after {silence:?}");
  assert!(second.is_closed());
  assert_eq!(transport.attempts(), 2);

  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn transport_error_disconnects_and_reconnects() {
  let transport = ScriptedTransport::new();
  let first = transport.add_link();
  let second = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  first.send(frame(r#"{"type":"run"}"#)).expect("feed open");
  first.send(Err(TransportError::Closed)).expect("feed open");

  wait_disconnected(&mut connection).await;
  let dropped_at = Instant::now();
  wait_connected(&mut connection).await;
  assert_eq!(dropped_at.elapsed(), Duration::from_secs(3));
  assert_eq!(transport.attempts(), 2);

  second.send(frame(r#"{"type":"run"}"#)).expect("feed open");
  let mut events = client.subscribe_events();
  wait_log_len(&mut events, 2).await;
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn server_close_and_refused_connects_keep_retrying() {
  let transport = ScriptedTransport::new();
  let first = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  drop(first);
  wait_disconnected(&mut connection).await;

  // No link queued: attempts are refused and retried on every delay.
  tokio::time::sleep(Duration::from_secs(10)).await;
  assert!(transport.attempts() >= 3);
  assert!(!client.is_connected());

  let _third = transport.add_link();
  wait_connected(&mut connection).await;
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn server_retry_field_changes_reconnect_delay() {
  let transport = ScriptedTransport::new();
  let first = transport.add_link();
  let _second = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  // A lone `retry:` line is inbound traffic too.
  send_and_wait_liveness(
    &first,
    &mut connection,
    Ok(SseMessage::Retry(Duration::from_millis(500))),
  )
  .await;
  first.send(Err(TransportError::Closed)).expect("feed open");

  wait_disconnected(&mut connection).await;
  let dropped_at = Instant::now();
  wait_connected(&mut connection).await;
  assert_eq!(dropped_at.elapsed(), Duration::from_millis(500));
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn server_retry_of_zero_is_floored() {
  let transport = ScriptedTransport::new();
  let first = transport.add_link();
  let _second = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  first.send(Ok(SseMessage::Retry(Duration::ZERO))).expect("feed open");
  first.send(Err(TransportError::Closed)).expect("feed open");

  wait_disconnected(&mut connection).await;
  let dropped_at = Instant::now();
  wait_connected(&mut connection).await;
  assert_eq!(dropped_at.elapsed(), Duration::from_millis(100));
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn clear_log_keeps_connection() {
  let transport = ScriptedTransport::new();
  let feed = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();
  let mut events = client.subscribe_events();

  client.start();
  wait_connected(&mut connection).await;
  feed.send(frame(r#"{"type":"a"}"#)).expect("feed open");
  feed.send(frame(r#"{"type":"b"}"#)).expect("feed open");
  wait_log_len(&mut events, 2).await;

  client.clear_log();
  wait_log_len(&mut events, 0).await;
  assert!(client.is_connected());
  assert!(!feed.is_closed());

  feed.send(frame(r#"{"type":"c"}"#)).expect("feed open");
  let log = wait_log_len(&mut events, 1).await;
  assert_eq!(log.head().and_then(|e| e.event_type()), Some("c"));
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_closes_transport_keeps_log_and_ignores_late_frames() {
  let transport = ScriptedTransport::new();
  let feed = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();
  let mut events = client.subscribe_events();

  client.start();
  wait_connected(&mut connection).await;
  feed.send(frame(r#"{"type":"run"}"#)).expect("feed open");
  wait_log_len(&mut events, 1).await;

  client.stop();
  let _ = feed.send(frame(r#"{"type":"late"}"#));
  wait_disconnected(&mut connection).await;
  tokio::time::sleep(Duration::from_secs(30)).await;

  assert!(feed.is_closed());
  assert_eq!(client.connection().phase, ConnectionPhase::Disconnected);
  let log = client.events();
  assert_eq!(log.len(), 1);
  assert_eq!(log.head().and_then(|e| e.event_type()), Some("run"));
  assert_eq!(transport.attempts(), 1);
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn restart_releases_previous_transport() {
  let transport = ScriptedTransport::new();
  let first = transport.add_link();
  let second = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();
  let mut events = client.subscribe_events();

  client.start();
  wait_connected(&mut connection).await;
  client.start();

  second.send(frame(r#"{"type":"fresh"}"#)).expect("feed open");
  let log = wait_log_len(&mut events, 1).await;
  assert_eq!(log.head().and_then(|e| e.event_type()), Some("fresh"));
  assert!(first.is_closed());
  assert_eq!(transport.attempts(), 2);
  client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_transport() {
  let transport = ScriptedTransport::new();
  let feed = transport.add_link();
  let mut client = EventStreamClient::new(transport.clone(), StreamSettings::default());
  let mut connection = client.subscribe_connection();

  client.start();
  wait_connected(&mut connection).await;
  client.shutdown().await;

  assert!(feed.is_closed());
  assert_eq!(connection.borrow().phase, ConnectionPhase::Disconnected);
}
