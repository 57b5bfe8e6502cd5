/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Read access to recorded sessions.
pub mod history_service;
/// Identity gate: opaque token verification.
pub mod identity;
/// Matchmaking queue operations and the pairing sweep.
pub mod queue_service;
/// Session lifecycle coordination and deadline timers.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
