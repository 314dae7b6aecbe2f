//! Request correlation for logs
//!
//! Every HTTP request gets a short trace id that the auth, dispatch and
//! response-logging stages share.

mod trace_context;

pub use trace_context::{generate_trace_id, RequestSpan, TraceContext};
