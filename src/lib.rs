// Public API - the runner and its configuration defaults
pub mod config;
pub mod runner;

// Internal modules - organized by subsystem
mod api;
mod credentials;
mod error;
mod formats;
mod loader;
mod telemetry;
mod warehouse;

#[cfg(test)]
mod integ_tests;
