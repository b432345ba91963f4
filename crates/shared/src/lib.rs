//! Shared configuration for ystore.
//!
//! Every other crate receives an [`AppConfig`] built once at startup and passed by
//! reference; nothing reads the environment after that.

pub mod config;

pub use config::AppConfig;
