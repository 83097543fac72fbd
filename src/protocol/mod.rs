//! # Dispatch Layer
//!
//! Routing of decoded packages to registered handlers.
//!
//! ## Components
//! - **Dispatcher**: immutable `(Id, Type)` route table with a configurable miss policy
//! - **HandlerContext**: cancellation signal and outbound sender for one invocation
//!
//! Dispatch failures stay inside this layer: a missing route or failing handler
//! affects only its own package, never the decode loop that produced it.

pub mod context;
pub mod dispatcher;
