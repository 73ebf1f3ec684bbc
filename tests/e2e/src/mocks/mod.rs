//! Canned request payloads

pub mod fixtures;
