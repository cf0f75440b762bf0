//! Incremental `text/event-stream` decoder.

use std::time::Duration;

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
  /// `event:` field, `"message"` when absent.
  pub event: String,
  /// `data:` lines joined with `\n`.
  pub data: String,
  /// Last `id:` seen on the stream.
  pub id: Option<String>,
}

/// Decoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseMessage {
  Event(SseEvent),
  /// Server-requested reconnection delay.
  Retry(Duration),
}

/// Stateful SSE parser.
///
/// Bytes are buffered until a full line is available, so chunks may split
/// lines or multi-byte characters anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
  buffer: Vec<u8>,
  started: bool,
  event_type: Option<String>,
  data: String,
  has_data: bool,
  last_event_id: Option<String>,
}

impl SseDecoder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Feeds one chunk and returns everything it completes.
  pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<SseMessage> {
    self.buffer.extend_from_slice(bytes);
    if !self.started {
      if self.buffer.len() < 3 && b"\xEF\xBB\xBF".starts_with(&self.buffer) {
        return Vec::new();
      }
      if self.buffer.starts_with(b"\xEF\xBB\xBF") {
        self.buffer.drain(..3);
      }
      self.started = true;
    }
    self.drain_lines()
  }

  pub fn push_text(&mut self, text: &str) -> Vec<SseMessage> {
    self.push_bytes(text.as_bytes())
  }

  fn drain_lines(&mut self) -> Vec<SseMessage> {
    let mut messages = Vec::new();
    let mut consumed = 0;
    let mut cursor = 0;

    while cursor < self.buffer.len() {
      let (line_end, next) = match self.buffer[cursor] {
        b'\n' => (cursor, cursor + 1),
        b'\r' => match self.buffer.get(cursor + 1) {
          Some(b'\n') => (cursor, cursor + 2),
          Some(_) => (cursor, cursor + 1),
          // Could be the first half of CRLF; wait for more input.
          None => break,
        },
        _ => {
          cursor += 1;
          continue;
        }
      };

      let line = String::from_utf8_lossy(&self.buffer[consumed..line_end]).into_owned();
      if let Some(message) = self.process_line(&line) {
        messages.push(message);
      }
      consumed = next;
      cursor = next;
    }

    self.buffer.drain(..consumed);
    messages
  }

  fn process_line(&mut self, line: &str) -> Option<SseMessage> {
    if line.is_empty() {
      return self.dispatch();
    }
    if line.starts_with(':') {
      return None;
    }

    let (field, value) = match line.split_once(':') {
      Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
      None => (line, ""),
    };

    match field {
      "event" => self.event_type = Some(value.to_string()),
      "data" => {
        if self.has_data {
          self.data.push('\n');
        }
        self.data.push_str(value);
        self.has_data = true;
      }
      "id" => {
        if !value.contains('\0') {
          self.last_event_id = Some(value.to_string());
        }
      }
      "retry" => {
        if !value.is_empty()
          && value.bytes().all(|b| b.is_ascii_digit())
          && let Ok(millis) = value.parse::<u64>()
        {
          return Some(SseMessage::Retry(Duration::from_millis(millis)));
        }
      }
      _ => {}
    }
    None
  }

  fn dispatch(&mut self) -> Option<SseMessage> {
    let event_type = self.event_type.take();
    if !self.has_data {
      return None;
    }
    self.has_data = false;
    Some(SseMessage::Event(SseEvent {
      event: event_type.unwrap_or_else(|| "message".to_string()),
      data: std::mem::take(&mut self.data),
      id: self.last_event_id.clone(),
    }))
  }
}
