// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Downstream role, table and key identifiers.

use serde::{Deserialize, Serialize};

use super::backend::BackendKind;
use crate::error::ConfigError;

pub const MEMORY_ROLE_ARN: &str = "arn:aws:iam::000000000000:role/TesseraResourceAccess";
pub const MEMORY_TABLE_NAME: &str = "tessera-tenants";
pub const MEMORY_KEY_ID: &str =
	"arn:aws:kms:us-east-1:000000000000:key/00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AwsConfigLayer {
	pub role_arn: Option<String>,
	pub table_name: Option<String>,
	pub key_id: Option<String>,
	pub region: Option<String>,
	pub sts_endpoint: Option<String>,
	pub dynamodb_endpoint: Option<String>,
	pub kms_endpoint: Option<String>,
}

impl AwsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.role_arn.is_some() {
			self.role_arn = other.role_arn;
		}
		if other.table_name.is_some() {
			self.table_name = other.table_name;
		}
		if other.key_id.is_some() {
			self.key_id = other.key_id;
		}
		if other.region.is_some() {
			self.region = other.region;
		}
		if other.sts_endpoint.is_some() {
			self.sts_endpoint = other.sts_endpoint;
		}
		if other.dynamodb_endpoint.is_some() {
			self.dynamodb_endpoint = other.dynamodb_endpoint;
		}
		if other.kms_endpoint.is_some() {
			self.kms_endpoint = other.kms_endpoint;
		}
	}

	/// Resolve identifiers for `backend`.
	///
	/// The AWS backend needs a role and a table, plus a key when encryption
	/// is on. The memory backend falls back to local placeholders.
	pub fn finalize(self, backend: BackendKind, encryption_enabled: bool) -> Result<AwsConfig, ConfigError> {
		let (role_arn, table_name, key_id) = match backend {
			BackendKind::Memory => (
				self.role_arn.unwrap_or_else(|| MEMORY_ROLE_ARN.to_string()),
				self.table_name.unwrap_or_else(|| MEMORY_TABLE_NAME.to_string()),
				self.key_id.unwrap_or_else(|| MEMORY_KEY_ID.to_string()),
			),
			BackendKind::Aws => {
				let mut missing = Vec::new();
				if self.role_arn.is_none() {
					missing.push("role_arn (TESSERA_ROLE_ARN)");
				}
				if self.table_name.is_none() {
					missing.push("table_name (TESSERA_TABLE_NAME)");
				}
				if encryption_enabled && self.key_id.is_none() {
					missing.push("key_id (TESSERA_KEY_ID)");
				}
				if !missing.is_empty() {
					return Err(ConfigError::Validation(format!(
						"aws backend requires {}",
						missing.join(", ")
					)));
				}
				(
					self.role_arn.unwrap_or_default(),
					self.table_name.unwrap_or_default(),
					self.key_id.unwrap_or_default(),
				)
			}
		};

		Ok(AwsConfig {
			role_arn,
			table_name,
			key_id,
			region: self.region,
			sts_endpoint: self.sts_endpoint,
			dynamodb_endpoint: self.dynamodb_endpoint,
			kms_endpoint: self.kms_endpoint,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct AwsConfig {
	pub role_arn: String,
	pub table_name: String,
	/// Empty when encryption is disabled and no key was configured.
	pub key_id: String,
	pub region: Option<String>,
	pub sts_endpoint: Option<String>,
	pub dynamodb_endpoint: Option<String>,
	pub kms_endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn complete() -> AwsConfigLayer {
		AwsConfigLayer {
			role_arn: Some("arn:aws:iam::123456789012:role/Access".to_string()),
			table_name: Some("tenants".to_string()),
			key_id: Some("1234abcd".to_string()),
			..Default::default()
		}
	}

	#[test]
	fn test_aws_backend_requires_identifiers() {
		let err = AwsConfigLayer::default()
			.finalize(BackendKind::Aws, true)
			.unwrap_err();
		let message = err.to_string();
		assert!(message.contains("role_arn"));
		assert!(message.contains("table_name"));
		assert!(message.contains("key_id"));
	}

	#[test]
	fn test_key_optional_without_encryption() {
		let layer = AwsConfigLayer {
			key_id: None,
			..complete()
		};
		assert!(layer.clone().finalize(BackendKind::Aws, true).is_err());
		let config = layer.finalize(BackendKind::Aws, false).unwrap();
		assert!(config.key_id.is_empty());
	}

	#[test]
	fn test_memory_backend_fills_placeholders() {
		let config = AwsConfigLayer::default()
			.finalize(BackendKind::Memory, true)
			.unwrap();
		assert_eq!(config.role_arn, MEMORY_ROLE_ARN);
		assert_eq!(config.table_name, MEMORY_TABLE_NAME);
		assert_eq!(config.key_id, MEMORY_KEY_ID);
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = complete();
		base.merge(AwsConfigLayer {
			region: Some("eu-west-1".to_string()),
			..Default::default()
		});
		let config = base.finalize(BackendKind::Aws, true).unwrap();
		assert_eq!(config.table_name, "tenants");
		assert_eq!(config.region.as_deref(), Some("eu-west-1"));
	}
}
