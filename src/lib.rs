// ABOUTME: Library root for dockyard - exposes the engine and its parts for testing.
// ABOUTME: The main binary is in main.rs.

pub mod build;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod launch;
pub mod logs;
pub mod model;
pub mod output;
pub mod runtime;
pub mod store;
pub mod types;
