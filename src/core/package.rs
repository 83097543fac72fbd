//! Package and header types shared by the decoder and encoder.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{constants, ProtocolError, Result};

/// Size of the fixed frame header: `BodyLength(2) Id(2) Type(1)`
pub const HEADER_SIZE: usize = 5;

/// Fixed 5-byte frame header, big-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub body_length: u16,
    pub id: u16,
    pub kind: u8,
}

impl Header {
    /// Parse a header from the front of `buf` without consuming it.
    ///
    /// Returns `None` when fewer than [`HEADER_SIZE`] bytes are available.
    #[inline]
    pub fn peek(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let mut cursor = &buf[..HEADER_SIZE];
        Some(Self {
            body_length: cursor.get_u16(),
            id: cursor.get_u16(),
            kind: cursor.get_u8(),
        })
    }

    /// Append the header to `dst`.
    #[inline]
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.put_u16(self.body_length);
        dst.put_u16(self.id);
        dst.put_u8(self.kind);
    }

    /// Total size of the frame this header describes.
    #[inline]
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.body_length as usize
    }
}

/// A decoded or to-be-encoded message unit.
///
/// Fields are public so packages can be assembled by hand; the encoder rejects
/// any package whose `body_length` disagrees with its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub body_length: u16,
    pub id: u16,
    pub kind: u8,
    pub body: Bytes,
}

impl Package {
    /// Build a package, deriving `body_length` from the body.
    pub fn new(id: u16, kind: u8, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        let body_length = u16::try_from(body.len()).map_err(|_| {
            ProtocolError::EncodeValidation(format!(
                "{}: {} bytes",
                constants::ERR_BODY_EXCEEDS_WIRE_LIMIT,
                body.len()
            ))
        })?;
        Ok(Self {
            body_length,
            id,
            kind,
            body,
        })
    }

    /// A package with no body.
    pub fn empty(id: u16, kind: u8) -> Self {
        Self {
            body_length: 0,
            id,
            kind,
            body: Bytes::new(),
        }
    }

    pub(crate) fn from_parts(header: Header, body: Bytes) -> Self {
        Self {
            body_length: header.body_length,
            id: header.id,
            kind: header.kind,
            body,
        }
    }

    pub fn header(&self) -> Header {
        Header {
            body_length: self.body_length,
            id: self.id,
            kind: self.kind,
        }
    }

    /// Size of this package on the wire.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }
}
