//! Fuzz target for line reassembly
//!
//! Clients write whatever they like, split however TCP splits it.
//!
//! # Strategy
//!
//! - Arbitrary bytes, including invalid UTF-8 and bare `\r`
//! - Arbitrary chunk boundaries, including empty chunks
//!
//! # Invariants
//!
//! - NEVER panic
//! - Until the first error, the decoded lines followed by the pending bytes
//!   are exactly the input, each line having lost only its `\n`
//! - No decoded line contains `\n`

#![no_main]

use arbitrary::Arbitrary;
use hearth_proto::LineDecoder;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Stream {
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|stream: Stream| {
    let mut decoder = LineDecoder::new();
    let mut fed = Vec::new();
    let mut rebuilt = Vec::new();

    for chunk in &stream.chunks {
        fed.extend_from_slice(chunk);
        let Ok(lines) = decoder.feed(chunk) else {
            return;
        };
        for line in lines {
            assert!(!line.contains('\n'), "line kept its terminator: {line:?}");
            rebuilt.extend_from_slice(line.as_bytes());
            rebuilt.push(b'\n');
        }
    }

    assert_eq!(rebuilt.len() + decoder.pending(), fed.len());
    assert_eq!(&fed[..rebuilt.len()], &rebuilt[..]);
});
