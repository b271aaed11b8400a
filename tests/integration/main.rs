//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no broker and no
//! real hardware required.

mod mocks;
mod sensing_tests;
mod supervisory_tests;
