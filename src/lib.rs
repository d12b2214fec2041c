// ABOUTME: Library root for fleetswap - exposes the orchestrator and its collaborators.
// ABOUTME: The main binary is in main.rs.

pub mod cloud;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod fleet;
pub mod health;
pub mod output;
pub mod prompt;
pub mod signal;
pub mod switch;
pub mod types;
