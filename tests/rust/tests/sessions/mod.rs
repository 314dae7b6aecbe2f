//! Session lifecycle integration tests
//!
//! Session creation, routing by `mcp-session-id`, termination and rejection
//! of unknown identifiers through the full router.

mod lifecycle;
