//! Per-dispatch context handed to every handler.

use tokio_util::sync::CancellationToken;

use crate::core::package::Package;
use crate::error::{ProtocolError, Result};
use crate::transport::outbound::Outbound;

/// Context for one handler invocation.
///
/// Carries the session's cancellation signal, which handlers are expected to
/// observe, and, inside a session, a sender for packages going back to the peer.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    session_id: u64,
    cancel: CancellationToken,
    outbound: Option<Outbound>,
}

impl HandlerContext {
    pub fn new(session_id: u64, cancel: CancellationToken) -> Self {
        Self {
            session_id,
            cancel,
            outbound: None,
        }
    }

    pub(crate) fn with_outbound(mut self, outbound: Outbound) -> Self {
        self.outbound = Some(outbound);
        self
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the owning session is closing.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Send a package to the peer on the same connection.
    ///
    /// Fails with [`ProtocolError::ConnectionClosed`] outside a session or once
    /// the writer has stopped.
    pub async fn send(&self, package: Package) -> Result<()> {
        match &self.outbound {
            Some(outbound) => outbound.send(package).await,
            None => Err(ProtocolError::ConnectionClosed),
        }
    }
}
