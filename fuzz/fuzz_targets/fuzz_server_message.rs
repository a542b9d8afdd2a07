#![no_main]

use libfuzzer_sys::fuzz_target;
use wordcraft_client::protocol::decode_server_message;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = decode_server_message(text);
    }
});
