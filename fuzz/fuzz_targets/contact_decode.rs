//! Contact decoding never panics; accepted contacts survive re-encoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ryxmsg_proto::Contact;

fuzz_target!(|data: &[u8]| {
    if let Ok(contact) = Contact::from_bytes(data) {
        let bytes = contact.to_bytes().expect("decoded contact re-encodes");
        assert_eq!(Contact::from_bytes(&bytes).ok(), Some(contact));
    }
});
