//! End-to-end test support
//!
//! A harness that drives the real HTTP router in-process, plus canned
//! request payloads for the common journeys.

pub mod harness;
pub mod mocks;

pub use harness::TestServer;
