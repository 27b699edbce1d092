//! Testing utilities for developing and verifying script sets

#[cfg(feature = "sqlite")]
pub mod sqlite;
