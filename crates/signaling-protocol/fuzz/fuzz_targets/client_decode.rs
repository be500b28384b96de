#![no_main]

use libfuzzer_sys::fuzz_target;
use signaling_protocol::codec::decode_client_message;

fuzz_target!(|data: &[u8]| {
    // Browsers only send text frames; anything else is rejected before decode
    if let Ok(text) = std::str::from_utf8(data) {
        // Must never panic, only return Err for invalid input
        let _ = decode_client_message(text);
    }
});
