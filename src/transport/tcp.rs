use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::protocol::dispatcher::Dispatcher;
use crate::transport::session::{ConnectionSession, SessionEnd, SessionHandle};
use crate::utils::metrics::Metrics;

/// Start a TCP server on `config.server.address`, stopping on CTRL+C.
#[instrument(skip(config, dispatcher), fields(address = %config.server.address))]
pub async fn start_server(config: ProtocolConfig, dispatcher: Arc<Dispatcher>) -> Result<()> {
    config.validate_strict()?;
    let listener = TcpListener::bind(&config.server.address).await?;

    // Create internal shutdown channel
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    let metrics = Arc::new(Metrics::new());
    let result =
        start_server_with_shutdown(listener, config, dispatcher, Arc::clone(&metrics), shutdown_rx)
            .await;
    metrics.log_metrics();
    result
}

/// Serve sessions on `listener` until `shutdown_rx` fires or its sender is dropped.
///
/// Every accepted connection gets its own [`ConnectionSession`] whose
/// cancellation token is a child of the server's, so shutdown reaches every
/// in-flight handler.
#[instrument(skip_all)]
pub async fn start_server_with_shutdown(
    listener: TcpListener,
    config: ProtocolConfig,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    config.validate_strict()?;
    let local_addr = listener.local_addr()?;
    info!(address = %local_addr, "Listening");

    let root = CancellationToken::new();
    let mut sessions: JoinSet<(u64, Result<SessionEnd>)> = JoinSet::new();
    let mut next_session_id: u64 = 1;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!(sessions = sessions.len(), "Shutting down server. Waiting for sessions to close...");
                break;
            }

            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                log_session_result(joined);
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        if sessions.len() >= config.server.max_connections {
                            metrics.connection_refused();
                            warn!(peer = %peer, limit = config.server.max_connections, "Connection limit reached, refusing");
                            drop(stream);
                        } else {
                            if let Err(e) = stream.set_nodelay(true) {
                                debug!(error = %e, "Failed to set TCP_NODELAY");
                            }

                            let session_id = next_session_id;
                            next_session_id += 1;
                            info!(peer = %peer, session_id, "New connection established");

                            let session = ConnectionSession::new(session_id, Arc::clone(&dispatcher), &config)?
                                .with_metrics(Arc::clone(&metrics))
                                .with_cancellation(root.child_token());
                            let handle = session.spawn(stream);
                            sessions.spawn(async move { (session_id, handle.closed().await) });
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }

    root.cancel();

    let drain = async {
        while let Some(joined) = sessions.join_next().await {
            log_session_result(joined);
        }
    };
    if tokio::time::timeout(config.session.shutdown_timeout, drain)
        .await
        .is_err()
    {
        warn!("Shutdown timeout reached, forcing exit");
        sessions.abort_all();
    } else {
        info!("All sessions closed, shutting down");
    }

    Ok(())
}

fn log_session_result(joined: std::result::Result<(u64, Result<SessionEnd>), JoinError>) {
    match joined {
        Ok((session_id, Ok(end))) => debug!(session_id, ?end, "Session finished"),
        Ok((session_id, Err(e))) => warn!(session_id, error = %e, "Session failed"),
        Err(e) => error!(error = %e, "Session task failed"),
    }
}

/// Connect to a server and run a session over the stream.
///
/// The framing and session sections are validated before any connection attempt.
#[instrument(skip(config, dispatcher))]
pub async fn connect(
    addr: &str,
    config: &ProtocolConfig,
    dispatcher: Arc<Dispatcher>,
) -> Result<SessionHandle> {
    let session = ConnectionSession::new(0, dispatcher, config)?;
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(session.spawn(stream))
}
