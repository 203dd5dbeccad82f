//! EnvGuard firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod classifier;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod ota;
pub mod pins;
pub mod readings;
pub mod reporter;

// ESP-IDF-only code paths are guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;
pub mod sensors;
