//! Inbound credential validation

pub mod jwks;
mod middleware;
mod validator;

pub use middleware::{auth_middleware, AuthLayerState};
pub use validator::{CredentialValidator, JwtValidator};
