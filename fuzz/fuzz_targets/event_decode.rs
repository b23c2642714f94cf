//! Metadata payload decoding over arbitrary tags and bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ryxmsg_proto::{GroupEvent, MetadataEnvelope};

fuzz_target!(|data: &[u8]| {
    let Some((tag, payload)) = data.split_first_chunk::<2>() else {
        return;
    };
    let envelope = MetadataEnvelope {
        group_pk: vec![0; 32],
        cursor: 0,
        event_type: u16::from_be_bytes(*tag),
        event: payload.to_vec(),
    };

    if let Ok(event) = GroupEvent::decode(&envelope) {
        assert_eq!(event.event_type(), envelope.event_type);
    }
});
