//! # tether-common
//!
//! Shared utilities for the client runtime: configuration, error types, and
//! telemetry setup.

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{
    ClientConfig, ConfigError, GatewayTuning, IdentityConfig, LockEndpoint, QueueConfig,
    RestConfig, RpcConfig, StartupConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig};
