//! # forkcast-core
//!
//! Chain-agnostic pieces of the harness: networks, address books,
//! configuration and the run journal.

pub mod address_book;
pub mod config;
pub mod journal;
pub mod network;

pub use address_book::{AbiKind, AddressBook, AddressBookError, Entry, FundingStrategy, TokenEntry};
pub use config::{ForkSpec, HarnessConfig};
pub use network::Network;
