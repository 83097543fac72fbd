//! `tokio_util` codec adapter over the frame decoder and encoder.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use super::decoder::{Decoded, FrameParser};
use super::encoder::FrameEncoder;
use super::package::Package;
use crate::config::{FramingConfig, DEFAULT_MAX_BODY_LENGTH};
use crate::error::{ProtocolError, Result};

/// Tokio codec for framing packages over any `AsyncRead`/`AsyncWrite`.
///
/// Shares the decoder's state machine and the encoder's validation, so
/// `Framed` users get the same size enforcement as [`super::decoder::FrameDecoder`].
#[derive(Debug, Clone)]
pub struct PackageCodec {
    parser: FrameParser,
    encoder: FrameEncoder,
}

impl PackageCodec {
    pub fn new(max_body_length: u16) -> Self {
        Self {
            parser: FrameParser::new(max_body_length),
            encoder: FrameEncoder::new(max_body_length),
        }
    }

    pub fn from_config(config: &FramingConfig) -> Self {
        Self::new(config.max_body_length)
    }

    pub fn is_corrupt(&self) -> bool {
        self.parser.is_corrupt()
    }
}

impl Default for PackageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_LENGTH)
    }
}

impl Decoder for PackageCodec {
    type Item = Package;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Package>> {
        match self.parser.decode(src)? {
            Decoded::Package(package) => Ok(Some(package)),
            Decoded::NeedMoreData => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Package>> {
        if let Some(package) = self.decode(src)? {
            return Ok(Some(package));
        }
        if !src.is_empty() || self.parser.is_mid_frame() {
            // Partial trailing frame is a normal end-of-stream
            debug!(bytes = src.len(), "Stream ended mid-frame, discarding partial bytes");
            self.parser.discard_partial(src);
        }
        Ok(None)
    }
}

impl Encoder<Package> for PackageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Package, dst: &mut BytesMut) -> Result<()> {
        self.encoder.encode_into(&item, dst)
    }
}
