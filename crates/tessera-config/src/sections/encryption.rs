// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side attribute encryption section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EncryptionConfigLayer {
	pub enabled: Option<bool>,
	/// Attributes stored as plaintext. The partition attribute always is.
	pub plaintext_fields: Option<Vec<String>>,
}

impl EncryptionConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.plaintext_fields.is_some() {
			self.plaintext_fields = other.plaintext_fields;
		}
	}

	pub fn finalize(self) -> EncryptionConfig {
		EncryptionConfig {
			enabled: self.enabled.unwrap_or(true),
			plaintext_fields: self.plaintext_fields.unwrap_or_default(),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionConfig {
	pub enabled: bool,
	pub plaintext_fields: Vec<String>,
}

impl Default for EncryptionConfig {
	fn default() -> Self {
		EncryptionConfigLayer::default().finalize()
	}
}
