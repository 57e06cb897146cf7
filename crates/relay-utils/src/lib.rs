//! Shared helpers used across the relay crates.

pub mod assert;
