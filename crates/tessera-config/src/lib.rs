// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the tessera service.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`TESSERA_*`)
//!
//! # Usage
//!
//! ```ignore
//! use tessera_config::load_config;
//!
//! let config = load_config()?;
//! println!("Listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServiceConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::debug;

/// Fully resolved service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
	pub http: HttpConfig,
	pub backend: BackendConfig,
	pub aws: AwsConfig,
	pub encryption: EncryptionConfig,
	pub logging: LoggingConfig,
}

impl ServiceConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TESSERA_*`)
/// 2. Config file (`/etc/tessera/service.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServiceConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServiceConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServiceConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServiceConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize a merged layer into resolved config.
pub fn finalize(layer: ServiceConfigLayer) -> Result<ServiceConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let backend = layer.backend.unwrap_or_default().finalize();
	let encryption = layer.encryption.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let aws = layer
		.aws
		.unwrap_or_default()
		.finalize(backend.kind, encryption.enabled)?;

	Ok(ServiceConfig {
		http,
		backend,
		aws,
		encryption,
		logging,
	})
}
