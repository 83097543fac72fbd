//! # Transport Layer
//!
//! Drives packages over duplex byte streams.
//!
//! ## Components
//! - **Session**: per-connection read/decode/dispatch/write with backpressure
//! - **Outbound**: validated sender into a session's writer
//! - **TCP**: accept loop with graceful shutdown and a client connector
//!
//! Any `AsyncRead + AsyncWrite` stream can carry a session; TCP is one option.

pub mod outbound;
pub mod session;
pub mod tcp;

pub use outbound::Outbound;
pub use session::{ConnectionSession, SessionEnd, SessionHandle};
