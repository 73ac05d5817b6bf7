//! Helpers for tests of the engine and of the crates built on it. Enabled with the `test_utils` feature.
pub mod fixtures;
pub mod mocks;

#[cfg(feature = "sqlite")]
pub mod prepare_env;
