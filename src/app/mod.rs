//! Application core: node services and their port boundary.
//!
//! The two node roles live here as services that own their domain state
//! (interlock, connection manager, aggregator, dispatcher).  All
//! interaction with brokers, sensors, relays and observers happens through
//! **port traits** defined in [`ports`], keeping this layer testable with
//! recording mocks.

pub mod commands;
pub mod events;
pub mod link;
pub mod ports;
pub mod sensing;
pub mod supervisory;
