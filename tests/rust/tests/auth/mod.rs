//! Auth integration tests
//!
//! Bearer validation on `/mcp` and the protected-resource metadata document.

mod metadata;
