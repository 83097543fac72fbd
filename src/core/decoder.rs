//! Incremental frame decoder.
//!
//! Bytes arrive in arbitrary chunks; the decoder keeps partial frames across
//! calls so the produced package sequence does not depend on how the stream
//! was split. Parsing is a small state machine:
//!
//! - `AwaitingHeader`: fewer than 5 bytes buffered
//! - `AwaitingBody`: header accepted, body incomplete
//! - `Corrupt`: a header declared an oversized body; terminal
//!
//! The declared length is checked against the cap before any body-sized
//! reservation, so a hostile header cannot force a large allocation.
//!
//! # Example
//!
//! ```rust
//! use package_protocol::core::decoder::FrameDecoder;
//!
//! let mut decoder = FrameDecoder::new(1024);
//! let mut frame = vec![0x00, 0x05, 0x00, 0x01, 0x02];
//! frame.extend_from_slice(b"hello");
//!
//! let packages: Vec<_> = decoder.feed(&frame).collect::<Result<_, _>>().unwrap();
//! assert_eq!(packages.len(), 1);
//! assert_eq!(&packages[0].body[..], b"hello");
//! ```

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use super::package::{Header, Package, HEADER_SIZE};
use crate::config::FramingConfig;
use crate::error::{ProtocolError, Result};

/// Outcome of a single decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete package was carved out of the buffer.
    Package(Package),
    /// The buffer holds only part of a frame.
    NeedMoreData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingHeader,
    AwaitingBody(Header),
    Corrupt,
}

/// State machine shared by [`FrameDecoder`] and the tokio codec adapter.
///
/// Operates on a caller-owned buffer so it can sit behind `FramedRead`.
#[derive(Debug, Clone)]
pub(crate) struct FrameParser {
    max_body_length: u16,
    state: State,
}

impl FrameParser {
    pub(crate) fn new(max_body_length: u16) -> Self {
        Self {
            max_body_length,
            state: State::AwaitingHeader,
        }
    }

    pub(crate) fn max_body_length(&self) -> u16 {
        self.max_body_length
    }

    pub(crate) fn is_corrupt(&self) -> bool {
        self.state == State::Corrupt
    }

    pub(crate) fn is_mid_frame(&self) -> bool {
        matches!(self.state, State::AwaitingBody(_))
    }

    /// Forget a partial frame after the stream ended.
    pub(crate) fn discard_partial(&mut self, src: &mut BytesMut) {
        src.clear();
        if !self.is_corrupt() {
            self.state = State::AwaitingHeader;
        }
    }

    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<Decoded> {
        loop {
            match self.state {
                State::Corrupt => return Err(ProtocolError::DecoderCorrupt),

                State::AwaitingHeader => {
                    let Some(header) = Header::peek(&src[..]) else {
                        return Ok(Decoded::NeedMoreData);
                    };

                    if header.body_length > self.max_body_length {
                        warn!(
                            declared = header.body_length,
                            max = self.max_body_length,
                            "Rejecting oversized frame"
                        );
                        self.state = State::Corrupt;
                        // Remaining bytes can no longer be trusted to align to frames
                        *src = BytesMut::new();
                        return Err(ProtocolError::OversizedMessage {
                            declared: header.body_length,
                            max: self.max_body_length,
                        });
                    }

                    src.advance(HEADER_SIZE);
                    let body_len = header.body_length as usize;
                    src.reserve(body_len.saturating_sub(src.len()));
                    self.state = State::AwaitingBody(header);
                }

                State::AwaitingBody(header) => {
                    let body_len = header.body_length as usize;
                    if src.len() < body_len {
                        return Ok(Decoded::NeedMoreData);
                    }

                    let body = src.split_to(body_len).freeze();
                    self.state = State::AwaitingHeader;
                    trace!(id = header.id, kind = header.kind, bytes = body_len, "Decoded frame");
                    return Ok(Decoded::Package(Package::from_parts(header, body)));
                }
            }
        }
    }
}

/// Incremental decoder owning its input buffer.
///
/// One instance belongs to one byte stream. After an oversized header it is
/// corrupt for good and must be discarded together with its connection.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    parser: FrameParser,
}

impl FrameDecoder {
    /// Create a decoder rejecting bodies longer than `max_body_length`.
    pub fn new(max_body_length: u16) -> Self {
        Self {
            buffer: BytesMut::new(),
            parser: FrameParser::new(max_body_length),
        }
    }

    pub fn from_config(config: &FramingConfig) -> Self {
        Self::new(config.max_body_length)
    }

    /// Append `data` and return a lazy iterator over the complete packages now
    /// available.
    ///
    /// Packages the iterator does not get to yield stay buffered for the next
    /// call. A corrupt decoder ignores `data` and yields
    /// [`ProtocolError::DecoderCorrupt`].
    pub fn feed(&mut self, data: &[u8]) -> Frames<'_> {
        if !self.parser.is_corrupt() {
            self.buffer.extend_from_slice(data);
        }
        Frames {
            decoder: self,
            done: false,
        }
    }

    /// Attempt to decode one package from the buffered bytes.
    pub fn decode_next(&mut self) -> Result<Decoded> {
        self.parser.decode(&mut self.buffer)
    }

    /// Bytes buffered but not yet emitted as part of a package.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_corrupt(&self) -> bool {
        self.parser.is_corrupt()
    }

    /// Whether a header has been accepted and its body is still incomplete.
    pub fn is_mid_frame(&self) -> bool {
        self.parser.is_mid_frame()
    }

    pub fn max_body_length(&self) -> u16 {
        self.parser.max_body_length()
    }
}

/// Iterator returned by [`FrameDecoder::feed`].
///
/// Ends when more input is needed or after the first error.
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
    done: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Package>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.decode_next() {
            Ok(Decoded::Package(package)) => Some(Ok(package)),
            Ok(Decoded::NeedMoreData) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(body_length: u16, id: u16, kind: u8, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&body_length.to_be_bytes());
        out.extend_from_slice(&id.to_be_bytes());
        out.push(kind);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_waits_for_header() {
        let mut decoder = FrameDecoder::new(1024);
        assert_eq!(decoder.feed(&[0x00, 0x05]).count(), 0);
        assert_eq!(decoder.pending_bytes(), 2);
        assert!(!decoder.is_mid_frame());
    }

    #[test]
    fn test_waits_for_body() {
        let mut decoder = FrameDecoder::new(1024);
        let bytes = frame(5, 1, 2, b"hello");
        assert_eq!(decoder.feed(&bytes[..7]).count(), 0);
        assert!(decoder.is_mid_frame());
        assert_eq!(decoder.pending_bytes(), 2);

        let packages: Vec<_> = decoder.feed(&bytes[7..]).map(|r| r.unwrap()).collect();
        assert_eq!(packages.len(), 1);
        assert_eq!(&packages[0].body[..], b"hello");
        assert!(!decoder.is_mid_frame());
    }

    #[test]
    fn test_oversized_header_reserves_nothing() {
        let mut decoder = FrameDecoder::new(1024);
        let mut items = decoder.feed(&frame(2048, 1, 2, &[]));
        assert!(matches!(
            items.next(),
            Some(Err(ProtocolError::OversizedMessage {
                declared: 2048,
                max: 1024
            }))
        ));
        assert!(items.next().is_none());
        drop(items);

        assert!(decoder.is_corrupt());
        assert_eq!(decoder.pending_bytes(), 0);
        assert!(decoder.buffer.capacity() < 2048);
    }

    #[test]
    fn test_corrupt_decoder_refuses_input() {
        let mut decoder = FrameDecoder::new(8);
        let _ = decoder.feed(&frame(9, 0, 0, &[])).count();

        let mut items = decoder.feed(&frame(1, 0, 0, b"x"));
        assert!(matches!(items.next(), Some(Err(ProtocolError::DecoderCorrupt))));
        assert!(items.next().is_none());
        drop(items);
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_unconsumed_frames_remain_buffered() {
        let mut decoder = FrameDecoder::new(64);
        let mut bytes = frame(1, 1, 1, b"a");
        bytes.extend(frame(1, 2, 1, b"b"));

        let first = decoder.feed(&bytes).next().unwrap().unwrap();
        assert_eq!(first.id, 1);

        let rest: Vec<_> = decoder.feed(&[]).map(|r| r.unwrap()).collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, 2);
    }

    #[test]
    fn test_zero_length_body() {
        let mut decoder = FrameDecoder::new(16);
        match decoder.feed(&frame(0, 9, 4, &[])).next() {
            Some(Ok(pkg)) => {
                assert_eq!(pkg, Package::empty(9, 4));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
