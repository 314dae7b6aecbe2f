//! Shared handler state

use restgate_core::GatewayConfig;
use std::sync::Arc;

use crate::dispatcher::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub dispatcher: Arc<Dispatcher>,
}
