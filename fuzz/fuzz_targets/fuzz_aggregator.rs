//! Fuzz target: `StateAggregator::on_message`
//!
//! Splits the input into a topic selector and a payload, and checks that a
//! rejected message never changes the mirrored state.
//!
//! cargo fuzz run fuzz_aggregator

#![no_main]

use hazardlink::aggregator::StateAggregator;
use hazardlink::protocol::Topics;
use libfuzzer_sys::fuzz_target;

const TOPICS: [&str; 5] = [
    "fz/data",
    "fz/alert",
    "fz/status",
    "fz/control",
    "elsewhere/data",
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let topic = TOPICS[usize::from(selector) % TOPICS.len()];

    let mut agg = StateAggregator::new(Topics::new("fz"), Some("n1".into()), 1_000, 5_000);
    let before = *agg.state();

    match agg.on_message(topic, payload, 100) {
        Ok(_) => assert_eq!(agg.state().last_updated_at, Some(100)),
        Err(_) => {
            assert_eq!(*agg.state(), before, "rejected message mutated the mirror");
            assert_eq!(agg.malformed_count(), 1);
        }
    }
});
