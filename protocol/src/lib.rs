//! Wire contract of the messaging processing backend.
//!
//! Everything in this crate mirrors the HTTP/SSE surface byte for byte:
//! field names are camelCase on the wire, and nothing here talks to the
//! network.

pub mod endpoints;
pub mod run;
pub mod scenario;

pub use endpoints::HEARTBEAT_EVENT_TYPE;
pub use run::{CustomRunConfig, ResetRequest, RunConfig, RunState, RunStatusSnapshot};
pub use scenario::{ParseScenarioError, ScenarioId};
