//! # Package Protocol
//!
//! Length-prefixed binary framing and ordered dispatch for streaming transports.
//!
//! Every message on the wire is a *package*: a fixed 5-byte header followed by
//! a body of at most `max_body_length` bytes.
//!
//! ```text
//! [BodyLength: u16] [Id: u16] [Type: u8] [Body: BodyLength bytes]   (big-endian)
//! ```
//!
//! ## Layers
//! - [`core`]: packages, the incremental [`FrameDecoder`], the [`FrameEncoder`]
//!   and a `tokio_util` codec
//! - [`protocol`]: the [`Dispatcher`] routing packages to handlers by `(Id, Type)`
//! - [`transport`]: [`ConnectionSession`] tying a byte stream to the decoder and
//!   dispatcher, plus a TCP accept loop
//! - [`config`], [`error`], [`utils`]: configuration, error taxonomy, logging and metrics
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use package_protocol::{Dispatcher, HandlerContext, Package, ProtocolConfig};
//!
//! async fn reply(pkg: Package, ctx: HandlerContext) -> package_protocol::Result<()> {
//!     ctx.send(Package::new(pkg.id, 3, pkg.body)?).await
//! }
//!
//! # async fn run() -> package_protocol::Result<()> {
//! let config = ProtocolConfig::default();
//! let mut routes = Dispatcher::builder(&config.dispatch);
//! routes.register(1, 2, reply)?;
//!
//! package_protocol::transport::tcp::start_server(config, Arc::new(routes.build())).await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::config::ProtocolConfig;
pub use crate::core::codec::PackageCodec;
pub use crate::core::decoder::{Decoded, FrameDecoder};
pub use crate::core::encoder::FrameEncoder;
pub use crate::core::package::{Header, Package, HEADER_SIZE};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::context::HandlerContext;
pub use crate::protocol::dispatcher::{
    DispatchOutcome, Dispatcher, DispatcherBuilder, PackageHandler, RouteKey,
};
pub use crate::transport::session::{ConnectionSession, SessionEnd, SessionHandle};
