//! # Navigator Common Crate
//!
//! This crate provides the value types, symbol canonicalization and error
//! definitions shared by the exchange adapters and the navigator engine.

/// Module for exchange-specific ticker aliases.
pub mod aliases;

/// Module for common error types.
pub mod errors;

/// Module for common data structures and types.
pub mod types;

// Re-export key items for easier access.
pub use errors::CommonError;
pub use types::{Asset, ExchangeId, ExchangeSnapshot, PairListing, PairStatus, Quantity, Ticker};
