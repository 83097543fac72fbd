//! Frame encoder.
//!
//! Validation runs before anything is written, so an inconsistent package
//! never leaves partial bytes in the output buffer.

use bytes::{BufMut, Bytes, BytesMut};

use super::package::{Package, HEADER_SIZE};
use crate::config::FramingConfig;
use crate::error::{constants, ProtocolError, Result};

/// Serializes packages into `[BodyLength(2)] [Id(2)] [Type(1)] [Body(N)]`, big-endian.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    max_body_length: u16,
}

impl FrameEncoder {
    pub fn new(max_body_length: u16) -> Self {
        Self { max_body_length }
    }

    pub fn from_config(config: &FramingConfig) -> Self {
        Self::new(config.max_body_length)
    }

    pub fn max_body_length(&self) -> u16 {
        self.max_body_length
    }

    /// Check a package against the length invariants.
    pub fn validate(&self, package: &Package) -> Result<()> {
        if package.body_length as usize != package.body.len() {
            return Err(ProtocolError::EncodeValidation(format!(
                "{}: declared {} bytes, body has {}",
                constants::ERR_BODY_LENGTH_MISMATCH,
                package.body_length,
                package.body.len()
            )));
        }
        if package.body_length > self.max_body_length {
            return Err(ProtocolError::EncodeValidation(format!(
                "{}: {} > {}",
                constants::ERR_BODY_TOO_LARGE,
                package.body_length,
                self.max_body_length
            )));
        }
        Ok(())
    }

    /// Encode into a fresh contiguous buffer.
    pub fn encode(&self, package: &Package) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        self.encode_into(package, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Append the encoded frame to `dst`. On error `dst` is untouched.
    pub fn encode_into(&self, package: &Package, dst: &mut BytesMut) -> Result<()> {
        self.validate(package)?;
        dst.reserve(HEADER_SIZE + package.body.len());
        package.header().write_to(dst);
        dst.put_slice(&package.body);
        Ok(())
    }
}
