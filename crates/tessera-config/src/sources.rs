// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServiceConfigLayer;
use crate::sections::{
	AwsConfigLayer, BackendConfigLayer, BackendKind, EncryptionConfigLayer, HttpConfigLayer,
	LogFormat, LoggingConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServiceConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServiceConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServiceConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/tessera/service.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServiceConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServiceConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServiceConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `TESSERA_<FIELD>`. The role, table and key identifiers also
/// accept `RESOURCE_ACCESS_ROLE_ARN`, `DEMO_TABLE_NAME` and `DEMO_KEY_ID`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServiceConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_layer(&|name| std::env::var(name).ok())
	}
}

/// Variable lookup; `std::env::var` in production.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn load_layer(lookup: Lookup<'_>) -> Result<ServiceConfigLayer, ConfigError> {
	Ok(ServiceConfigLayer {
		http: Some(load_http_from_env(lookup)?),
		backend: Some(load_backend_from_env(lookup)?),
		aws: Some(load_aws_from_env(lookup)),
		encryption: Some(load_encryption_from_env(lookup)),
		logging: Some(load_logging_from_env(lookup)?),
	})
}

fn env_var(lookup: Lookup<'_>, name: &str) -> Option<String> {
	lookup(name).filter(|s| !s.is_empty())
}

fn env_var_or(lookup: Lookup<'_>, name: &str, fallback: &str) -> Option<String> {
	env_var(lookup, name).or_else(|| env_var(lookup, fallback))
}

fn env_bool(lookup: Lookup<'_>, name: &str) -> Option<bool> {
	env_var(lookup, name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u16(lookup: Lookup<'_>, name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(lookup, name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u16 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_parsed<T: std::str::FromStr<Err = String>>(
	lookup: Lookup<'_>,
	name: &str,
) -> Result<Option<T>, ConfigError> {
	match env_var(lookup, name) {
		Some(v) => v.parse().map(Some).map_err(|message| ConfigError::InvalidValue {
			key: name.to_string(),
			message,
		}),
		None => Ok(None),
	}
}

fn env_list(lookup: Lookup<'_>, name: &str) -> Option<Vec<String>> {
	env_var(lookup, name).map(|s| {
		s.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	})
}

fn load_http_from_env(lookup: Lookup<'_>) -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var(lookup, "TESSERA_HOST"),
		port: env_u16(lookup, "TESSERA_PORT")?,
	})
}

fn load_backend_from_env(lookup: Lookup<'_>) -> Result<BackendConfigLayer, ConfigError> {
	Ok(BackendConfigLayer {
		kind: env_parsed::<BackendKind>(lookup, "TESSERA_BACKEND")?,
	})
}

fn load_aws_from_env(lookup: Lookup<'_>) -> AwsConfigLayer {
	AwsConfigLayer {
		role_arn: env_var_or(lookup, "TESSERA_ROLE_ARN", "RESOURCE_ACCESS_ROLE_ARN"),
		table_name: env_var_or(lookup, "TESSERA_TABLE_NAME", "DEMO_TABLE_NAME"),
		key_id: env_var_or(lookup, "TESSERA_KEY_ID", "DEMO_KEY_ID"),
		region: env_var(lookup, "TESSERA_AWS_REGION"),
		sts_endpoint: env_var(lookup, "TESSERA_STS_ENDPOINT"),
		dynamodb_endpoint: env_var(lookup, "TESSERA_DYNAMODB_ENDPOINT"),
		kms_endpoint: env_var(lookup, "TESSERA_KMS_ENDPOINT"),
	}
}

fn load_encryption_from_env(lookup: Lookup<'_>) -> EncryptionConfigLayer {
	EncryptionConfigLayer {
		enabled: env_bool(lookup, "TESSERA_ENCRYPTION_ENABLED"),
		plaintext_fields: env_list(lookup, "TESSERA_ENCRYPTION_PLAINTEXT_FIELDS"),
	}
}

fn load_logging_from_env(lookup: Lookup<'_>) -> Result<LoggingConfigLayer, ConfigError> {
	Ok(LoggingConfigLayer {
		level: env_var(lookup, "TESSERA_LOG_LEVEL"),
		format: env_parsed::<LogFormat>(lookup, "TESSERA_LOG_FORMAT")?,
	})
}

#[cfg(test)]
pub(crate) fn load_layer_from(vars: &[(&str, &str)]) -> Result<ServiceConfigLayer, ConfigError> {
	let vars: std::collections::HashMap<String, String> = vars
		.iter()
		.map(|(k, v)| (k.to_string(), v.to_string()))
		.collect();
	load_layer(&|name| vars.get(name).cloned())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let source = DefaultsSource;
		let layer = source.load().unwrap();
		assert!(layer.http.is_none());
		assert!(layer.aws.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let source = TomlSource::new("/nonexistent/config.toml");
		let layer = source.load().unwrap();
		assert!(layer.http.is_none());
	}

	#[test]
	fn test_toml_source_reads_sections() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[backend]
kind = "memory"

[aws]
table_name = "tenants"

[encryption]
plaintext_fields = ["created_at"]
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(layer.backend.unwrap().kind, Some(BackendKind::Memory));
		assert_eq!(layer.aws.unwrap().table_name.as_deref(), Some("tenants"));
		assert_eq!(
			layer.encryption.unwrap().plaintext_fields,
			Some(vec!["created_at".to_string()])
		);
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[http]\nport = \"not a number\"").unwrap();
		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_reads_prefixed_variables() {
		let layer = load_layer_from(&[
			("TESSERA_PORT", "9090"),
			("TESSERA_BACKEND", "memory"),
			("TESSERA_ROLE_ARN", "arn:aws:iam::123456789012:role/Access"),
			("TESSERA_ENCRYPTION_ENABLED", "false"),
			("TESSERA_ENCRYPTION_PLAINTEXT_FIELDS", "a, b,,c"),
			("TESSERA_LOG_FORMAT", "json"),
		])
		.unwrap();

		assert_eq!(layer.http.unwrap().port, Some(9090));
		assert_eq!(layer.backend.unwrap().kind, Some(BackendKind::Memory));
		assert_eq!(
			layer.aws.unwrap().role_arn.as_deref(),
			Some("arn:aws:iam::123456789012:role/Access")
		);
		let encryption = layer.encryption.unwrap();
		assert_eq!(encryption.enabled, Some(false));
		assert_eq!(
			encryption.plaintext_fields,
			Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
		);
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn test_env_accepts_deployment_fallbacks() {
		let layer = load_layer_from(&[
			("RESOURCE_ACCESS_ROLE_ARN", "arn:aws:iam::123456789012:role/Fallback"),
			("DEMO_TABLE_NAME", "demo"),
			("DEMO_KEY_ID", "key-1"),
			("TESSERA_KEY_ID", "key-2"),
		])
		.unwrap();
		let aws = layer.aws.unwrap();
		assert_eq!(aws.role_arn.as_deref(), Some("arn:aws:iam::123456789012:role/Fallback"));
		assert_eq!(aws.table_name.as_deref(), Some("demo"));
		assert_eq!(aws.key_id.as_deref(), Some("key-2"));
	}

	#[test]
	fn test_env_invalid_values() {
		assert!(matches!(
			load_layer_from(&[("TESSERA_PORT", "eighty")]).unwrap_err(),
			ConfigError::InvalidValue { .. }
		));
		assert!(matches!(
			load_layer_from(&[("TESSERA_BACKEND", "gcp")]).unwrap_err(),
			ConfigError::InvalidValue { .. }
		));
	}

	#[test]
	fn test_empty_env_values_are_unset() {
		let layer = load_layer_from(&[("TESSERA_HOST", "")]).unwrap();
		assert!(layer.http.unwrap().host.is_none());
	}
}
