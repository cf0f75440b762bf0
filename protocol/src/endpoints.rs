// Backend endpoint paths

/// `POST` with a [`crate::RunConfig`] body.
pub const RUN_START: &str = "api/run/start";
/// `POST`, no body.
pub const RUN_STOP: &str = "api/run/stop";
/// `POST` with a [`crate::ResetRequest`] body.
pub const RUN_RESET: &str = "api/run/reset";
/// `GET`, answers with a [`crate::RunStatusSnapshot`].
pub const RUN_STATUS: &str = "api/run/status";
/// `GET`, `text/event-stream`.
pub const EVENTS_STREAM: &str = "api/events/stream";

/// `type` tag of liveness-only stream frames.
pub const HEARTBEAT_EVENT_TYPE: &str = "heartbeat";
