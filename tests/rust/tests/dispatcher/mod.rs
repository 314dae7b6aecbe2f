//! Dispatcher integration tests
//!
//! The downstream credential pipeline end to end: inbound bearer, token
//! exchange at the authorization server, fallback token from disk, and the
//! per-session cache, observed at the REST backend.

mod credentials;
