//! Shared types, error definitions, and utilities used across the reelay crates.

pub mod error;
pub mod time;
pub mod types;

pub use error::FromMessage;
