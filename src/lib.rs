//! # forkcast
//!
//! Fork-based integration harness for DeFi Smart Account connectors.
//!
//! Re-exports [`forkcast_core`] and [`forkcast_evm`] under one name.

pub use forkcast_core;
pub use forkcast_evm;

/// Returns the library version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
