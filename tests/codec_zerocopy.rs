//! Integration tests for the frame decoder, encoder and tokio codec
//!
//! Covers the reference scenarios, incremental input and the zero-copy
//! behaviour of bodies carved out of the read buffer.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use package_protocol::core::codec::PackageCodec;
use package_protocol::core::decoder::{Decoded, FrameDecoder};
use package_protocol::core::encoder::FrameEncoder;
use package_protocol::core::package::{Package, HEADER_SIZE};
use package_protocol::error::ProtocolError;
use tokio_util::codec::{Decoder, Encoder};

fn scenario_a_bytes() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x05, 0x00, 0x01, 0x02];
    bytes.extend_from_slice(b"hello");
    bytes
}

#[test]
fn test_scenario_a_single_frame() {
    let mut decoder = FrameDecoder::new(1024);

    let packages: Vec<Package> = decoder
        .feed(&scenario_a_bytes())
        .collect::<Result<_, _>>()
        .expect("Failed to decode");

    assert_eq!(packages.len(), 1);
    let pkg = &packages[0];
    assert_eq!(pkg.body_length, 5);
    assert_eq!(pkg.id, 1);
    assert_eq!(pkg.kind, 2);
    assert_eq!(&pkg.body[..], b"hello");
    assert_eq!(decoder.pending_bytes(), 0);
}

#[test]
fn test_scenario_b_byte_at_a_time() {
    let mut decoder = FrameDecoder::new(1024);
    let bytes = scenario_a_bytes();
    let mut packages = Vec::new();

    for (i, byte) in bytes.iter().enumerate() {
        let produced: Vec<Package> = decoder
            .feed(&[*byte])
            .collect::<Result<_, _>>()
            .expect("Should not error");

        if i < bytes.len() - 1 {
            assert!(produced.is_empty(), "no package before byte {i} completes the frame");
        }
        packages.extend(produced);
    }

    assert_eq!(packages, vec![Package::new(1, 2, &b"hello"[..]).unwrap()]);
}

#[test]
fn test_scenario_c_oversized_declaration() {
    let mut decoder = FrameDecoder::new(1024);
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&2048u16.to_be_bytes());
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.push(2);

    let results: Vec<_> = decoder.feed(&bytes).collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0],
        Err(ProtocolError::OversizedMessage {
            declared: 2048,
            max: 1024
        })
    ));
    assert!(decoder.is_corrupt());

    // More bytes never produce packages from a corrupt decoder
    let later: Vec<_> = decoder.feed(&[0u8; 4096]).collect();
    assert!(later.iter().all(|r| r.is_err()));
    assert_eq!(decoder.pending_bytes(), 0);
}

#[test]
fn test_decode_next_reports_need_more_data() {
    let mut decoder = FrameDecoder::new(1024);
    assert_eq!(decoder.decode_next().unwrap(), Decoded::NeedMoreData);

    let _ = decoder.feed(&scenario_a_bytes()[..3]).count();
    assert_eq!(decoder.decode_next().unwrap(), Decoded::NeedMoreData);
}

#[test]
fn test_multiple_frames_in_one_feed() {
    let encoder = FrameEncoder::new(1024);
    let mut stream = BytesMut::new();
    for i in 0..5u16 {
        let pkg = Package::new(i, 7, vec![i as u8; i as usize]).unwrap();
        encoder.encode_into(&pkg, &mut stream).unwrap();
    }

    let mut decoder = FrameDecoder::new(1024);
    let packages: Vec<Package> = decoder.feed(&stream).collect::<Result<_, _>>().unwrap();

    assert_eq!(packages.len(), 5);
    for (i, pkg) in packages.iter().enumerate() {
        assert_eq!(pkg.id, i as u16);
        assert_eq!(pkg.body.len(), i);
    }
}

#[test]
fn test_codec_partial_decode_preserves_buffer() {
    let mut codec = PackageCodec::new(1024);

    // Only part of the header
    let mut buffer = BytesMut::from(&[0x00, 0x05, 0x00][..]);

    let result = codec.decode(&mut buffer).expect("Decode should not error");

    assert!(result.is_none());
    assert_eq!(buffer.len(), 3);
}

#[test]
fn test_codec_decode_zero_copy_split() {
    let mut codec = PackageCodec::new(1024);
    let mut buffer = BytesMut::from(&scenario_a_bytes()[..]);
    let body_ptr = buffer[HEADER_SIZE..].as_ptr();

    let decoded = codec
        .decode(&mut buffer)
        .expect("Failed to decode")
        .expect("Should have package");

    // Body is a view into the original read buffer
    assert_eq!(decoded.body.as_ptr(), body_ptr);
    assert_eq!(buffer.len(), 0);
}

#[test]
fn test_codec_encode_reserves_exact_frame() {
    let mut codec = PackageCodec::new(1024);
    let pkg = Package::new(3, 4, vec![0u8; 100]).unwrap();

    let mut buffer = BytesMut::new();
    codec.encode(pkg.clone(), &mut buffer).expect("Failed to encode");

    assert_eq!(buffer.len(), HEADER_SIZE + 100);

    let decoded = codec
        .decode(&mut buffer)
        .expect("Failed to decode")
        .expect("Should have package");
    assert_eq!(decoded, pkg);
}

#[test]
fn test_codec_buffer_reuse() {
    let mut codec = PackageCodec::new(1024);
    let mut buffer = BytesMut::with_capacity(1000);

    for i in 0..10u8 {
        let pkg = Package::new(i as u16, i, vec![i; 10]).unwrap();
        codec.encode(pkg, &mut buffer).expect("Failed to encode");
    }

    assert_eq!(buffer.len(), 10 * (HEADER_SIZE + 10));

    let mut count = 0u8;
    while let Some(pkg) = codec.decode(&mut buffer).expect("Failed to decode") {
        assert_eq!(pkg.kind, count);
        assert_eq!(pkg.body[0], count);
        count += 1;
    }
    assert_eq!(count, 10);
}

#[test]
fn test_codec_oversized_is_terminal() {
    let mut codec = PackageCodec::new(16);
    let mut buffer = BytesMut::from(&[0x00, 0x20, 0x00, 0x00, 0x00][..]);

    assert!(matches!(
        codec.decode(&mut buffer),
        Err(ProtocolError::OversizedMessage { declared: 32, max: 16 })
    ));
    assert!(codec.is_corrupt());

    buffer.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00]);
    assert!(matches!(
        codec.decode(&mut buffer),
        Err(ProtocolError::DecoderCorrupt)
    ));
}

#[test]
fn test_encode_is_contiguous_bytes() {
    let encoder = FrameEncoder::new(1024);
    let pkg = Package::new(0xABCD, 0xEF, Bytes::from_static(b"xyz")).unwrap();

    let bytes = encoder.encode(&pkg).unwrap();
    assert_eq!(&bytes[..], &[0x00, 0x03, 0xAB, 0xCD, 0xEF, b'x', b'y', b'z']);
}
