// msgdeck Core Library

pub mod control;
pub mod error;
pub mod http;
pub mod scenario;
pub mod status;
pub mod stream;

pub use control::RunControlClient;
pub use error::{ControlCommand, ControlError, Result, TransportError};
pub use scenario::{SCENARIO_PRESETS, ScenarioPreset, resolve_scenario};
pub use status::{StatusPoller, StatusSettings, StatusSource};
pub use stream::{
  ConnectionPhase, ConnectionState, EventStreamClient, StreamSettings,
  event::{EventBody, EventKind, StreamEvent},
  log::EventLogSnapshot,
  transport::{EventTransport, SseTransport},
};
