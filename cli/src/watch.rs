// Live view: connection state, run status and newly logged events

use anyhow::Result;
use uuid::Uuid;

use msgdeck_core::{
    ConnectionPhase, EventBody, EventLogSnapshot, EventStreamClient, StatusPoller, StreamEvent,
};
use msgdeck_protocol::RunStatusSnapshot;

use crate::describe_status;

/// Drives the stream client and the poller until Ctrl-C, printing changes.
pub async fn run(mut stream: EventStreamClient, poller: StatusPoller, json: bool) -> Result<()> {
    let mut connection = stream.subscribe_connection();
    let mut events = stream.subscribe_events();
    let mut status = poller.subscribe();
    let mut printer = EventPrinter::new(json);

    stream.start();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut phase = ConnectionPhase::Disconnected;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                break;
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = connection.borrow_and_update().phase;
                if current != phase {
                    phase = current;
                    printer.connection(phase);
                }
            }
            changed = events.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = events.borrow_and_update().clone();
                printer.events(&snapshot);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    printer.status(&snapshot);
                }
            }
        }
    }

    stream.shutdown().await;
    poller.shutdown().await;
    Ok(())
}

struct EventPrinter {
    json: bool,
    /// Head of the log as of the last print.
    last_seen: Option<Uuid>,
    last_status: Option<RunStatusSnapshot>,
}

impl EventPrinter {
    fn new(json: bool) -> Self {
        Self {
            json,
            last_seen: None,
            last_status: None,
        }
    }

    fn connection(&self, phase: ConnectionPhase) {
        if self.json {
            return;
        }
        let label = match phase {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
        };
        println!("-- stream {label}");
    }

    fn status(&mut self, snapshot: &RunStatusSnapshot) {
        if self.json || self.last_status.as_ref() == Some(snapshot) {
            return;
        }
        println!("-- {}", describe_status(snapshot));
        self.last_status = Some(snapshot.clone());
    }

    fn events(&mut self, snapshot: &EventLogSnapshot) {
        let fresh = fresh_events(snapshot, self.last_seen);
        self.last_seen = snapshot.head().map(|event| event.id);
        for event in fresh.into_iter().rev() {
            if self.json {
                match serde_json::to_string(event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => tracing::warn!(error = %err, "failed to encode event"),
                }
            } else {
                println!("{}", render_event(event));
            }
        }
    }
}

/// Entries logged after `last_seen`, newest first.
///
/// A cleared or fully rotated log yields everything it holds.
fn fresh_events(snapshot: &EventLogSnapshot, last_seen: Option<Uuid>) -> Vec<&StreamEvent> {
    snapshot
        .iter()
        .take_while(|event| Some(event.id) != last_seen)
        .collect()
}

fn render_event(event: &StreamEvent) -> String {
    match &event.body {
        EventBody::Raw { message, timestamp } => format!("{timestamp} {:<12} {message}", "raw"),
        EventBody::Data(payload) => {
            let kind = event.event_type().unwrap_or("-");
            let detail = match event.message() {
                Some(message) => message.to_string(),
                None => serde_json::Value::Object(payload.clone()).to_string(),
            };
            match event.timestamp() {
                Some(timestamp) => format!("{timestamp} {kind:<12} {detail}"),
                None => format!("{kind:<12} {detail}"),
            }
        }
    }
}
