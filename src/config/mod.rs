//! Configuration module for the report gateway
//!
//! This module provides the `GatewayConfig` struct, its builder, and
//! environment loading for credentials, cache policy and storage location.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::GatewayConfigBuilder;
pub use types::{GatewayConfig, HttpCacheConfig};
