//! # Core Framing Components
//!
//! Packages, the incremental decoder, the encoder and the tokio codec adapter.
//!
//! ## Wire Format
//! ```text
//! [BodyLength(2)] [Id(2)] [Type(1)] [Body(BodyLength)]
//! ```
//! Multi-byte fields are big-endian.
//!
//! ## Security
//! - Declared body length is checked against `max_body_length` before any
//!   body-sized allocation
//! - An oversized header leaves the decoder corrupt; the session must close

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod package;
