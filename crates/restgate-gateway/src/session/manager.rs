//! rmcp session manager backed by the session registry
//!
//! rmcp's [`LocalSessionManager`] owns each session's transport worker. This
//! wrapper keeps the [`SessionRegistry`] in step with it: a session is added
//! once its `initialize` has been answered successfully and removed when rmcp
//! closes it, whether by DELETE, service shutdown or an idle sweep.

use futures::Stream;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::transport::streamable_http_server::session::local::{
    LocalSessionManager, LocalSessionManagerError,
};
use rmcp::transport::streamable_http_server::session::{ServerSseMessage, SessionId};
use rmcp::transport::streamable_http_server::SessionManager;
use std::sync::Arc;
use tracing::{debug, info};

use super::SessionRegistry;

pub struct RegistrySessionManager {
    inner: LocalSessionManager,
    registry: Arc<SessionRegistry>,
}

impl RegistrySessionManager {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            inner: LocalSessionManager::default(),
            registry,
        }
    }
}

impl SessionManager for RegistrySessionManager {
    type Error = LocalSessionManagerError;
    type Transport = <LocalSessionManager as SessionManager>::Transport;

    async fn create_session(&self) -> Result<(SessionId, Self::Transport), Self::Error> {
        let (id, transport) = self.inner.create_session().await?;
        debug!(session_id = %id, "Transport allocated");
        Ok((id, transport))
    }

    async fn initialize_session(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> Result<ServerJsonRpcMessage, Self::Error> {
        let response = self.inner.initialize_session(id, message).await?;
        match &response {
            ServerJsonRpcMessage::Response(_) => {
                if self.registry.add(id) {
                    info!(session_id = %id, sessions = self.registry.count(), "Session started");
                }
            }
            _ => {
                debug!(session_id = %id, "Initialize failed, session not registered");
                self.inner.close_session(id).await?;
            }
        }
        Ok(response)
    }

    async fn has_session(&self, id: &SessionId) -> Result<bool, Self::Error> {
        self.inner.has_session(id).await
    }

    async fn close_session(&self, id: &SessionId) -> Result<(), Self::Error> {
        if self.registry.delete(Some(id)) {
            info!(session_id = %id, "Session closed");
        }
        self.inner.close_session(id).await
    }

    async fn create_stream(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error> {
        self.registry.touch(id);
        self.inner.create_stream(id, message).await
    }

    async fn accept_message(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> Result<(), Self::Error> {
        self.registry.touch(id);
        self.inner.accept_message(id, message).await
    }

    async fn create_standalone_stream(
        &self,
        id: &SessionId,
    ) -> Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error> {
        self.registry.touch(id);
        self.inner.create_standalone_stream(id).await
    }

    async fn resume(
        &self,
        id: &SessionId,
        last_event_id: String,
    ) -> Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error> {
        self.registry.touch(id);
        self.inner.resume(id, last_event_id).await
    }
}
