//! Connection session: one transport, one decoder, one ordered dispatch queue.
//!
//! A session runs three tasks:
//!
//! - the **reader** feeds transport bytes to a [`FrameDecoder`] and queues each
//!   decoded package, in order, for dispatch
//! - the **dispatch worker** runs handlers one at a time in queue order, so
//!   per-connection ordering holds even when handlers are slow
//! - the **writer** encodes outbound packages onto the transport
//!
//! The dispatch queue is bounded. While it is full the reader issues no further
//! reads, which pushes backpressure onto the peer instead of buffering without
//! limit.
//!
//! When the peer closes its side, every package already decoded is still
//! dispatched before the session ends. A framing error ends the session at
//! once: reads stop, packages still queued are skipped, the transport is closed
//! and [`SessionHandle::closed`] resolves to the error.

use std::sync::Arc;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

use crate::config::{FramingConfig, ProtocolConfig, SessionConfig};
use crate::core::codec::PackageCodec;
use crate::core::decoder::FrameDecoder;
use crate::core::encoder::FrameEncoder;
use crate::core::package::Package;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::context::HandlerContext;
use crate::protocol::dispatcher::{DispatchOutcome, Dispatcher};
use crate::transport::outbound::Outbound;
use crate::utils::metrics::{Metrics, Timer};

/// How a session ended without a framing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed its side of the stream.
    PeerClosed,
    /// The session was closed locally.
    LocalClose,
}

/// Session configuration and collaborators, before a transport is attached.
pub struct ConnectionSession {
    id: u64,
    dispatcher: Arc<Dispatcher>,
    framing: FramingConfig,
    config: SessionConfig,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

impl ConnectionSession {
    /// Fails with [`ProtocolError::ConfigError`] when the framing or session
    /// section does not validate.
    pub fn new(id: u64, dispatcher: Arc<Dispatcher>, config: &ProtocolConfig) -> Result<Self> {
        let mut errors = config.framing.validate();
        errors.extend(config.session.validate());
        if !errors.is_empty() {
            return Err(ProtocolError::ConfigError(format!(
                "Invalid session configuration: {}",
                errors.join("; ")
            )));
        }

        Ok(Self {
            id,
            dispatcher,
            framing: config.framing.clone(),
            config: config.session.clone(),
            metrics: Arc::new(Metrics::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Report into a shared metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Use `token` as the session's close signal, e.g. a server's child token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Attach the transport and start the session tasks.
    pub fn spawn<T>(self, transport: T) -> SessionHandle
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(transport);
        let (out_tx, out_rx) = mpsc::channel(self.config.outbound_queue_limit);
        let outbound = Outbound::new(out_tx, FrameEncoder::from_config(&self.framing));

        let handle_outbound = outbound.clone();
        let cancel = self.cancel.clone();
        let id = self.id;
        let task = tokio::spawn(self.run(reader, writer, outbound, out_rx));

        SessionHandle {
            id,
            outbound: handle_outbound,
            cancel,
            task,
        }
    }

    #[instrument(skip_all, fields(session_id = self.id))]
    async fn run<R, W>(
        self,
        reader: R,
        writer: W,
        outbound: Outbound,
        out_rx: mpsc::Receiver<Package>,
    ) -> Result<SessionEnd>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.metrics.session_started();
        debug!("Session started");

        let (dispatch_tx, dispatch_rx) = mpsc::channel(self.config.dispatch_queue_limit);

        let writer_task = tokio::spawn(
            write_loop(
                writer,
                out_rx,
                PackageCodec::from_config(&self.framing),
                self.cancel.clone(),
                Arc::clone(&self.metrics),
            )
            .in_current_span(),
        );
        let mut worker_task = tokio::spawn(
            dispatch_loop(
                self.id,
                Arc::clone(&self.dispatcher),
                dispatch_rx,
                outbound,
                self.cancel.clone(),
                Arc::clone(&self.metrics),
            )
            .in_current_span(),
        );

        let result = self.read_loop(reader, dispatch_tx).await;

        if matches!(result, Ok(SessionEnd::PeerClosed)) {
            // Packages already decoded still reach their handlers. The queue is
            // bounded, so only a local close puts a deadline on the drain.
            let drained = tokio::select! {
                joined = &mut worker_task => {
                    log_worker_exit(joined);
                    true
                }
                _ = self.cancel.cancelled() => false,
            };
            if !drained {
                self.join_worker(&mut worker_task).await;
            }
            self.cancel.cancel();
        } else {
            self.cancel.cancel();
            self.join_worker(&mut worker_task).await;
        }

        if let Err(e) = writer_task.await {
            warn!(error = %e, "Writer task terminated abnormally");
        }

        self.metrics.session_ended();
        match &result {
            Ok(end) => info!(?end, "Session closed"),
            Err(e) if e.is_session_fatal() => {
                self.metrics.session_failed();
                error!(error = %e, "Session closed on framing error");
            }
            Err(e) => {
                self.metrics.session_failed();
                error!(error = %e, "Session closed on error");
            }
        }
        result
    }

    async fn read_loop<R>(
        &self,
        mut reader: R,
        dispatch_tx: mpsc::Sender<Package>,
    ) -> Result<SessionEnd>
    where
        R: AsyncRead + Unpin,
    {
        let mut decoder = FrameDecoder::from_config(&self.framing);
        let mut chunk = vec![0u8; self.config.read_buffer_size];

        loop {
            if dispatch_tx.capacity() == 0 {
                self.metrics.backpressure_stall();
                debug!("Dispatch queue full, pausing reads");
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(SessionEnd::LocalClose),
                    permit = dispatch_tx.reserve() => {
                        drop(permit.map_err(|_| worker_gone())?);
                    }
                }
            }

            let n = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(SessionEnd::LocalClose),
                read = reader.read(&mut chunk) => read?,
            };

            if n == 0 {
                if decoder.pending_bytes() > 0 || decoder.is_mid_frame() {
                    debug!(
                        bytes = decoder.pending_bytes(),
                        "Peer closed mid-frame, discarding partial bytes"
                    );
                }
                return Ok(SessionEnd::PeerClosed);
            }
            self.metrics.bytes_read(n as u64);

            for item in decoder.feed(&chunk[..n]) {
                let package = match item {
                    Ok(package) => package,
                    Err(e) => {
                        if let ProtocolError::OversizedMessage { .. } = e {
                            self.metrics.oversized_rejection();
                        }
                        return Err(e);
                    }
                };
                self.metrics.package_decoded();

                if let Some(end) = self.enqueue(&dispatch_tx, package).await? {
                    return Ok(end);
                }
            }
        }
    }

    /// Queue a package for the worker, waiting while the queue is full.
    async fn enqueue(
        &self,
        dispatch_tx: &mpsc::Sender<Package>,
        package: Package,
    ) -> Result<Option<SessionEnd>> {
        match dispatch_tx.try_send(package) {
            Ok(()) => Ok(None),
            Err(TrySendError::Full(package)) => {
                self.metrics.backpressure_stall();
                debug!("Dispatch queue full, pausing reads");
                tokio::select! {
                    _ = self.cancel.cancelled() => Ok(Some(SessionEnd::LocalClose)),
                    sent = dispatch_tx.send(package) => {
                        sent.map_err(|_| worker_gone())?;
                        Ok(None)
                    }
                }
            }
            Err(TrySendError::Closed(_)) => Err(worker_gone()),
        }
    }

    async fn join_worker(&self, worker_task: &mut JoinHandle<()>) {
        match tokio::time::timeout(self.config.shutdown_timeout, worker_task).await {
            Ok(joined) => log_worker_exit(joined),
            Err(_) => {
                // The straggling handler keeps running detached
                warn!(
                    timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                    "Dispatch worker did not stop within shutdown timeout"
                );
            }
        }
    }
}

fn log_worker_exit(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "Dispatch worker terminated abnormally");
    }
}

fn worker_gone() -> ProtocolError {
    ProtocolError::Custom(constants::ERR_SESSION_TASK_FAILED.to_string())
}

async fn dispatch_loop(
    session_id: u64,
    dispatcher: Arc<Dispatcher>,
    mut rx: mpsc::Receiver<Package>,
    outbound: Outbound,
    cancel: CancellationToken,
    metrics: Arc<Metrics>,
) {
    while let Some(package) = rx.recv().await {
        let (id, kind) = (package.id, package.kind);

        if cancel.is_cancelled() {
            metrics.dispatch_cancelled();
            trace!(id, kind, "Skipping queued package, session closing");
            continue;
        }

        let ctx = HandlerContext::new(session_id, cancel.clone()).with_outbound(outbound.clone());
        let dispatcher = Arc::clone(&dispatcher);
        let timer = Timer::start("dispatch");
        // Own task so a panicking handler cannot take the worker down with it
        let joined = tokio::spawn(async move { dispatcher.dispatch(package, ctx).await }).await;
        drop(timer);

        match joined {
            Ok(Ok(DispatchOutcome::Handled)) => metrics.package_dispatched(),
            Ok(Ok(DispatchOutcome::Missed)) => metrics.dispatch_miss(),
            Ok(Err(e)) => {
                metrics.handler_failure();
                warn!(id, kind, error = %e, "Handler failed");
            }
            Err(e) => {
                metrics.handler_failure();
                error!(id, kind, error = %e, "Handler panicked");
            }
        }
    }
}

async fn write_loop<W>(
    writer: W,
    mut rx: mpsc::Receiver<Package>,
    codec: PackageCodec,
    cancel: CancellationToken,
    metrics: Arc<Metrics>,
) where
    W: AsyncWrite + Unpin,
{
    let mut framed = FramedWrite::new(writer, codec);

    loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(package) => {
                    if !write_one(&mut framed, package, &metrics).await {
                        break;
                    }
                }
                None => break,
            },
            _ = cancel.cancelled() => {
                // Flush what was queued before the close
                while let Ok(package) = rx.try_recv() {
                    if !write_one(&mut framed, package, &metrics).await {
                        break;
                    }
                }
                break;
            }
        }
    }

    if let Err(e) = framed.close().await {
        debug!(error = %e, "Transport shutdown failed");
    }
}

async fn write_one<W>(
    framed: &mut FramedWrite<W, PackageCodec>,
    package: Package,
    metrics: &Metrics,
) -> bool
where
    W: AsyncWrite + Unpin,
{
    let frame_len = package.frame_len() as u64;
    match framed.send(package).await {
        Ok(()) => {
            metrics.package_sent(frame_len);
            true
        }
        Err(e) => {
            warn!(error = %e, "Write failed, stopping writer");
            false
        }
    }
}

/// Handle to a running session.
pub struct SessionHandle {
    id: u64,
    outbound: Outbound,
    cancel: CancellationToken,
    task: JoinHandle<Result<SessionEnd>>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Sender for packages to the peer, cloneable across tasks.
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    /// Validate and queue a package for the peer.
    pub async fn send(&self, package: Package) -> Result<()> {
        self.outbound.send(package).await
    }

    /// Signal the session to close. Handlers see the cancellation through
    /// their [`HandlerContext`].
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end.
    ///
    /// Resolves to the framing error that ended it, if any.
    pub async fn closed(self) -> Result<SessionEnd> {
        self.task.await.map_err(|e| {
            ProtocolError::Custom(format!("{}: {e}", constants::ERR_SESSION_TASK_FAILED))
        })?
    }
}
