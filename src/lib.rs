//! HazardLink library.
//!
//! Coordinates a sensing node and a supervisory node over MQTT: threshold
//! classification, a relay safety interlock, connection management with
//! backoff, and supervisory state aggregation with alert fan-out.  The
//! node services are hardware- and broker-agnostic; everything external
//! sits behind the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod aggregator;
pub mod app;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod interlock;
pub mod model;
pub mod protocol;
pub mod runtime;
pub mod scheduler;
pub mod threshold;

// Links the std time driver that async-io-mini's Timer runs on.
use embassy_time as _;
