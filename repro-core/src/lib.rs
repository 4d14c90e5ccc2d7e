//! Core types and tables for the TLS 1.3 keep-alive blocking
//! reproduction harness: run configuration, the runtime version guard,
//! and the workload shape. No I/O lives here.

mod config;
mod constants;
mod naming;
mod version;

pub use config::*;
pub use constants::*;
pub use naming::*;
pub use version::*;
