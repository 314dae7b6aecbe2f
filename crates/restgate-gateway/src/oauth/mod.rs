//! Authorization server integration: discovery and token exchange

mod discovery;
mod exchange;

pub use discovery::{AuthServerMetadata, DiscoveryCache};
pub use exchange::{CredentialExchanger, TokenExchanger, ACCESS_TOKEN_TYPE, TOKEN_EXCHANGE_GRANT};
