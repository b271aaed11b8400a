//! Fuzz target: `Message::decode` and `decode_control`
//!
//! Feeds arbitrary bytes to both inbound decoders.  Neither may panic, and
//! anything the JSON decoder accepts must survive a re-encode with the same
//! topic kind and node.
//!
//! cargo fuzz run fuzz_message_decoder

#![no_main]

use hazardlink::protocol::{Message, decode_control, encode_control};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = Message::decode(data) {
        assert!(!msg.node().is_empty(), "decoder accepted an empty node id");
        let bytes = msg.encode().expect("decoded message must re-encode");
        let again = Message::decode(&bytes).expect("re-encoded message must decode");
        assert_eq!(again.topic_kind(), msg.topic_kind());
        assert_eq!(again.node(), msg.node());
    }

    if let Ok(action) = decode_control(data) {
        let text = core::str::from_utf8(data).expect("accepted control must be UTF-8");
        assert_eq!(text.trim(), encode_control(action));
    }
});
