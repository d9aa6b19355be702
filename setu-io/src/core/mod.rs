//! Core definitions shared by the protocol and data paths.
//!
//! - [`types`]: block geometry and byte helpers
//! - [`state`]: session registers (modes and byte counters)

pub mod state;
pub mod types;
