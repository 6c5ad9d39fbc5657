//! Fuzz target for eHuB packet decoding.
//!
//! Feeds arbitrary byte sequences through the decoder to find:
//! - Parser crashes or panics
//! - Integer overflows in length handling
//! - Buffer over-reads around the declared payload length
//! - Gzip inflation blowups on garbage payloads
//!
//! The decoder must NEVER panic; all invalid input returns an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lumibridge_proto::decode_packet;

fuzz_target!(|data: &[u8]| {
    // Any structured outcome is fine, a panic is not.
    let _ = decode_packet(data);
});
