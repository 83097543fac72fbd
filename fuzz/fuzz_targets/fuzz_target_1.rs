#![no_main]

use libfuzzer_sys::fuzz_target;
use package_protocol::FrameDecoder;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes in two uneven pieces; must never panic or over-allocate
    let mut decoder = FrameDecoder::new(1024);
    let split = data.first().map_or(0, |b| *b as usize).min(data.len());
    for piece in [&data[..split], &data[split..]] {
        for item in decoder.feed(piece) {
            if let Ok(package) = item {
                assert_eq!(package.body.len(), package.body_length as usize);
                assert!(package.body_length <= 1024);
            }
        }
    }
});
