//! # Treat Commander Common
//!
//! Shared plumbing for the Treat Commander offline-shell crates.
//!
//! ## Features
//!
//! - Logging configuration and setup
//! - Best-effort background task helper

pub mod logging;
pub mod task;

pub use logging::{init_logging, LogConfig, LogFormat};
pub use task::spawn_best_effort;
