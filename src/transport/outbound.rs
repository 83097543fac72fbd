use tokio::sync::mpsc;

use crate::core::encoder::FrameEncoder;
use crate::core::package::Package;
use crate::error::{ProtocolError, Result};

/// Cloneable sender feeding a session's writer task.
///
/// Packages are validated here, before they are queued, so a bad package
/// fails at the caller and never reaches the transport.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Package>,
    encoder: FrameEncoder,
}

impl Outbound {
    pub(crate) fn new(tx: mpsc::Sender<Package>, encoder: FrameEncoder) -> Self {
        Self { tx, encoder }
    }

    /// Validate and queue a package for the writer.
    pub async fn send(&self, package: Package) -> Result<()> {
        self.encoder.validate(&package)?;
        self.tx
            .send(package)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
