#![no_main]

use libfuzzer_sys::fuzz_target;
use odata_adapter::literal::{decode, decode_key, encode, unescape_string};

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data) {
        // Key and literal parsing must never panic
        let _ = decode_key(s);
        let _ = decode(s);

        // Any string survives quoting
        let encoded = encode(s).expect("strings always encode");
        let decoded = unescape_string(&encoded).expect("encoded string decodes");
        assert_eq!(decoded, s);

    }
});
