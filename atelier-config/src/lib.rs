//! Shared configuration library for Atelier.
//!
//! This crate owns the typed client configuration (service endpoints,
//! transport timeout, scanner tuning) and the loader that resolves it from
//! files, inline JSON and environment variables. The client library and the
//! `atelierctl` binary both load through [`ConfigLoader`] so defaults and
//! validation rules live in one place.

pub mod error;
pub mod loader;
pub mod models;

pub use error::ConfigLoadError;
pub use loader::{ConfigLoad, ConfigLoader, ConfigSource, EnvSource, ProcessEnv};
pub use models::scanner::ScannerConfig;
pub use models::{ClientConfig, ServiceEndpoints, ServiceRoute};
