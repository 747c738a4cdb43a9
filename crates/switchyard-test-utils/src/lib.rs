#![deny(unsafe_code)]

//! Shared test utilities for the Switchyard workspace.
//!
//! Provides reusable fixtures, config builders, and tracing helpers so that
//! individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! switchyard-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod mock;
pub mod project;
pub mod tracing_setup;

pub use config::TestConfigBuilder;
pub use mock::MockProvider;
pub use project::TestProject;
