//! Common types and utilities for the rust-pathval controller application.
//!
//! This crate provides the pieces shared by the rule-management core, the
//! simulated switch fabric, and the CLI: device/port/table identifiers, the
//! static topology model, error types, and Ethernet/IPv4/ICMP frame helpers.

pub mod error;
pub mod packet;
pub mod topology;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
