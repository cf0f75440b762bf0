//! Live event stream client
//!
//! [`EventStreamClient`] keeps one logical subscription to the backend's push
//! endpoint and turns it into two observable values: a [`ConnectionState`]
//! and a bounded, newest-first [`EventLogSnapshot`].
//!
//! A single driver task owns the transport, the watchdog, the connection
//! state and the log. The handle talks to it through a command channel and
//! reads published snapshots, so nothing is shared behind a lock.
//!
//! Transport "open" is trusted optimistically. While connected, a watchdog
//! compares the time since the last inbound frame against the staleness
//! threshold and tears a silent connection down even when the transport
//! itself reports no error. The watchdog holds off only until the very first
//! frame; a reopened transport is measured from the moment it opened. Every
//! failure ends in `Disconnected` followed by a reconnect; none of them reach
//! the caller.

pub mod event;
pub mod log;
pub mod sse;
pub mod transport;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};

use msgdeck_config::StreamConfig;

use crate::error::TransportError;
use self::event::{Ingest, classify};
use self::log::{DEFAULT_LOG_CAPACITY, EventLog, EventLogSnapshot};
use self::sse::SseMessage;
use self::transport::{EventTransport, FrameStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
  Disconnected,
  Connecting,
  Connected,
}

/// Published connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
  pub phase: ConnectionPhase,
  /// Arrival of the most recent inbound frame of any kind, heartbeats included.
  pub last_liveness_at: Option<Instant>,
}

impl ConnectionState {
  pub fn is_connected(&self) -> bool {
    self.phase == ConnectionPhase::Connected
  }
}

impl Default for ConnectionState {
  fn default() -> Self {
    Self {
      phase: ConnectionPhase::Disconnected,
      last_liveness_at: None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
  pub log_capacity: usize,
  /// Longest silence tolerated while connected.
  pub staleness_threshold: Duration,
  pub watchdog_interval: Duration,
  /// Pause before reopening; a server `retry:` field replaces it, floored
  /// at 100ms.
  pub reconnect_delay: Duration,
}

impl Default for StreamSettings {
  fn default() -> Self {
    Self {
      log_capacity: DEFAULT_LOG_CAPACITY,
      staleness_threshold: Duration::from_secs(5),
      watchdog_interval: Duration::from_secs(1),
      reconnect_delay: Duration::from_secs(3),
    }
  }
}

impl From<&StreamConfig> for StreamSettings {
  fn from(config: &StreamConfig) -> Self {
    Self {
      log_capacity: config.log_capacity,
      staleness_threshold: Duration::from_millis(config.staleness_threshold_ms),
      watchdog_interval: Duration::from_millis(config.watchdog_interval_ms),
      reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
    }
  }
}

/// Lower bound on a server-requested reconnect delay.
const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);

enum Command {
  Start(CancellationToken),
  Stop,
  ClearLog,
}

/// Handle to the stream driver.
///
/// Dropping the handle aborts the driver, which closes the transport and
/// releases the watchdog with it.
pub struct EventStreamClient {
  commands: mpsc::UnboundedSender<Command>,
  connection: watch::Receiver<ConnectionState>,
  log: watch::Receiver<EventLogSnapshot>,
  session: Option<CancellationToken>,
  shutdown: CancellationToken,
  task: AbortOnDropHandle<()>,
}

impl EventStreamClient {
  /// Spawns the driver in the `Disconnected` state. Nothing connects until
  /// [`start`](Self::start).
  pub fn new<T: EventTransport>(transport: Arc<T>, settings: StreamSettings) -> Self {
    let (commands, command_rx) = mpsc::unbounded_channel();
    let (connection_tx, connection) = watch::channel(ConnectionState::default());
    let (log_tx, log) = watch::channel(EventLogSnapshot::default());
    let shutdown = CancellationToken::new();

    let driver = Driver {
      transport,
      settings,
      reconnect_delay: settings.reconnect_delay,
      commands: command_rx,
      connection_tx,
      log_tx,
      state: ConnectionState::default(),
      log: EventLog::new(settings.log_capacity),
      link: Link::Idle,
    };
    let task = tokio::spawn(driver.run(shutdown.clone()));

    Self {
      commands,
      connection,
      log,
      session: None,
      shutdown,
      task: AbortOnDropHandle::new(task),
    }
  }

  /// Opens a fresh connection, closing any previous one first.
  pub fn start(&mut self) {
    if let Some(previous) = self.session.take() {
      previous.cancel();
    }
    let session = self.shutdown.child_token();
    self.session = Some(session.clone());
    let _ = self.commands.send(Command::Start(session));
  }

  /// Closes the connection and cancels the watchdog. The log is kept.
  ///
  /// No frame of the stopped connection is applied once this returns.
  pub fn stop(&mut self) {
    if let Some(session) = self.session.take() {
      session.cancel();
    }
    let _ = self.commands.send(Command::Stop);
  }

  /// Empties the log without touching the connection.
  pub fn clear_log(&self) {
    let _ = self.commands.send(Command::ClearLog);
  }

  pub fn connection(&self) -> ConnectionState {
    *self.connection.borrow()
  }

  pub fn is_connected(&self) -> bool {
    self.connection.borrow().is_connected()
  }

  pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
    self.connection.clone()
  }

  pub fn events(&self) -> EventLogSnapshot {
    self.log.borrow().clone()
  }

  pub fn subscribe_events(&self) -> watch::Receiver<EventLogSnapshot> {
    self.log.clone()
  }

  /// Stops the driver and waits until the transport is closed.
  pub async fn shutdown(self) {
    if let Some(session) = &self.session {
      session.cancel();
    }
    self.shutdown.cancel();
    let _ = self.task.await;
  }
}

type ConnectAttempt = Pin<Box<dyn Future<Output = Result<FrameStream, TransportError>> + Send>>;

/// The transport side of the driver. Every variant except `Idle` belongs to
/// one session; cancelling the session token ends it.
enum Link {
  Idle,
  /// Waiting out the reconnect delay.
  Backoff {
    session: CancellationToken,
    until: Instant,
  },
  Connecting {
    session: CancellationToken,
    attempt: ConnectAttempt,
  },
  Open {
    session: CancellationToken,
    frames: FrameStream,
    watchdog: Interval,
    /// Last frame on this transport, or its open time if a frame was ever
    /// seen before. The watchdog stays quiet while this is unset.
    last_frame_at: Option<Instant>,
  },
}

enum LinkStep {
  Cancelled,
  Reconnect,
  Opened(FrameStream),
  Failed(TransportError),
  Message(SseMessage),
  WatchdogTick,
}

impl Link {
  async fn next(&mut self) -> LinkStep {
    match self {
      Link::Idle => std::future::pending().await,
      Link::Backoff { session, until } => tokio::select! {
        biased;
        _ = session.cancelled() => LinkStep::Cancelled,
        _ = sleep_until(*until) => LinkStep::Reconnect,
      },
      Link::Connecting { session, attempt } => tokio::select! {
        biased;
        _ = session.cancelled() => LinkStep::Cancelled,
        result = attempt => match result {
          Ok(frames) => LinkStep::Opened(frames),
          Err(err) => LinkStep::Failed(err),
        },
      },
      Link::Open {
        session,
        frames,
        watchdog,
        ..
      } => tokio::select! {
        biased;
        _ = session.cancelled() => LinkStep::Cancelled,
        item = frames.next() => match item {
          Some(Ok(message)) => LinkStep::Message(message),
          Some(Err(err)) => LinkStep::Failed(err),
          None => LinkStep::Failed(TransportError::Closed),
        },
        _ = watchdog.tick() => LinkStep::WatchdogTick,
      },
    }
  }

  fn session(&self) -> Option<&CancellationToken> {
    match self {
      Link::Idle => None,
      Link::Backoff { session, .. }
      | Link::Connecting { session, .. }
      | Link::Open { session, .. } => Some(session),
    }
  }

  /// Drops the transport and watchdog, handing back the session.
  fn take_session(&mut self) -> Option<CancellationToken> {
    match std::mem::replace(self, Link::Idle) {
      Link::Idle => None,
      Link::Backoff { session, .. }
      | Link::Connecting { session, .. }
      | Link::Open { session, .. } => Some(session),
    }
  }
}

struct Driver<T> {
  transport: Arc<T>,
  settings: StreamSettings,
  reconnect_delay: Duration,
  commands: mpsc::UnboundedReceiver<Command>,
  connection_tx: watch::Sender<ConnectionState>,
  log_tx: watch::Sender<EventLogSnapshot>,
  state: ConnectionState,
  log: EventLog,
  link: Link,
}

impl<T: EventTransport> Driver<T> {
  async fn run(mut self, shutdown: CancellationToken) {
    loop {
      tokio::select! {
        biased;
        _ = shutdown.cancelled() => break,
        command = self.commands.recv() => match command {
          Some(command) => self.handle_command(command),
          None => break,
        },
        step = self.link.next() => self.handle_step(step),
      }
    }

    self.link.take_session();
    self.set_phase(ConnectionPhase::Disconnected);
    debug!("event stream driver stopped");
  }

  fn handle_command(&mut self, command: Command) {
    match command {
      Command::Start(session) => {
        if self.link.take_session().is_some() {
          debug!("closing previous event stream before restart");
        }
        if session.is_cancelled() {
          self.set_phase(ConnectionPhase::Disconnected);
          return;
        }
        self.connect(session);
      }
      Command::Stop => {
        self.link.take_session();
        self.set_phase(ConnectionPhase::Disconnected);
      }
      Command::ClearLog => {
        self.log.clear();
        self.publish_log();
      }
    }
  }

  fn handle_step(&mut self, step: LinkStep) {
    match step {
      LinkStep::Cancelled => {
        self.link.take_session();
        self.set_phase(ConnectionPhase::Disconnected);
      }
      LinkStep::Reconnect => {
        if let Some(session) = self.link.take_session() {
          info!("reconnecting event stream");
          self.connect(session);
        }
      }
      LinkStep::Opened(frames) => {
        let Some(session) = self.link.take_session() else {
          return;
        };
        let now = Instant::now();
        let period = self.settings.watchdog_interval;
        let mut watchdog = interval_at(now + period, period);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Once any frame has been seen, a reopened transport gets one full
        // threshold from open to prove itself.
        let last_frame_at = self.state.last_liveness_at.map(|_| now);
        self.link = Link::Open {
          session,
          frames,
          watchdog,
          last_frame_at,
        };
        self.set_phase(ConnectionPhase::Connected);
      }
      LinkStep::Failed(err) => {
        warn!(error = %err, "event stream transport failed");
        self.schedule_reconnect();
      }
      LinkStep::Message(SseMessage::Retry(delay)) => {
        if self.link.session().is_none_or(CancellationToken::is_cancelled) {
          return;
        }
        let delay = delay.max(MIN_RECONNECT_DELAY);
        debug!(?delay, "server set reconnect delay");
        self.reconnect_delay = delay;
        self.mark_alive();
        self.connection_tx.send_replace(self.state);
      }
      LinkStep::Message(SseMessage::Event(event)) => {
        if self.link.session().is_none_or(CancellationToken::is_cancelled) {
          return;
        }
        debug!(event = %event.event, "frame received");
        self.ingest(&event.data);
      }
      LinkStep::WatchdogTick => self.check_liveness(),
    }
  }

  fn connect(&mut self, session: CancellationToken) {
    let transport = Arc::clone(&self.transport);
    self.link = Link::Connecting {
      session,
      attempt: Box::pin(async move { transport.connect().await }),
    };
    self.set_phase(ConnectionPhase::Connecting);
  }

  /// Closes whatever transport is active and waits out the reconnect delay.
  fn schedule_reconnect(&mut self) {
    if let Some(session) = self.link.take_session() {
      self.link = Link::Backoff {
        session,
        until: Instant::now() + self.reconnect_delay,
      };
    }
    self.set_phase(ConnectionPhase::Disconnected);
  }

  /// Records inbound traffic on the open transport.
  fn mark_alive(&mut self) {
    let now = Instant::now();
    if let Link::Open { last_frame_at, .. } = &mut self.link {
      *last_frame_at = Some(now);
    }
    self.state.last_liveness_at = Some(now);
    self.state.phase = ConnectionPhase::Connected;
  }

  fn ingest(&mut self, data: &str) {
    self.mark_alive();

    match classify(data) {
      Ingest::Heartbeat => {}
      Ingest::Event(event) => {
        if event.payload().is_none() {
          debug!(len = data.len(), "frame is not a JSON object, logging as raw");
        }
        if let Some(evicted) = self.log.push(event) {
          debug!(id = %evicted.id, "event log full, evicted oldest entry");
        }
        self.publish_log();
      }
    }
    self.connection_tx.send_replace(self.state);
  }

  fn check_liveness(&mut self) {
    let Link::Open {
      last_frame_at: Some(last),
      ..
    } = &self.link
    else {
      return;
    };
    if self.state.phase != ConnectionPhase::Connected {
      return;
    }

    let silence = Instant::now().saturating_duration_since(*last);
    if silence > self.settings.staleness_threshold {
      warn!(
        silence_ms = silence.as_millis() as u64,
        threshold_ms = self.settings.staleness_threshold.as_millis() as u64,
        "event stream went silent, forcing reconnect"
      );
      self.schedule_reconnect();
    }
  }

  fn set_phase(&mut self, phase: ConnectionPhase) {
    if self.state.phase == phase {
      return;
    }
    info!(from = ?self.state.phase, to = ?phase, "event stream connection changed");
    self.state.phase = phase;
    self.connection_tx.send_replace(self.state);
  }

  fn publish_log(&self) {
    self.log_tx.send_replace(self.log.snapshot());
  }
}
