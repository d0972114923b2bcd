//! Server library: router construction, configuration, logging, and
//! metrics. The binary in `main.rs` wires these together; integration
//! tests drive the same router in-process.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
