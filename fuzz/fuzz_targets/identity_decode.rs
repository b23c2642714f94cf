//! Identity decoding must reject garbage without panicking, and anything it
//! accepts must re-encode to the same string.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ryxmsg_core::identity;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(bytes) = identity::decode(text) {
        assert!(!bytes.is_empty());
        assert!(bytes.len() <= identity::MAX_IDENTITY_LEN);
        assert_eq!(identity::encode(&bytes), text);
    }
});
