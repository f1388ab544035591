//! Loginwatch daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `loginwatch-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod health;
pub mod heartbeat;
pub mod logging;
pub mod metrics_server;
pub mod modules;
pub mod orchestrator;
