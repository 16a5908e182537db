// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by a single source.

use serde::{Deserialize, Serialize};

use crate::sections::{
	AwsConfigLayer, BackendConfigLayer, EncryptionConfigLayer, HttpConfigLayer, LoggingConfigLayer,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfigLayer {
	pub http: Option<HttpConfigLayer>,
	pub backend: Option<BackendConfigLayer>,
	pub aws: Option<AwsConfigLayer>,
	pub encryption: Option<EncryptionConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		(_, None) => {}
	}
}

impl ServiceConfigLayer {
	/// Overlay `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.backend, other.backend, BackendConfigLayer::merge);
		merge_section(&mut self.aws, other.aws, AwsConfigLayer::merge);
		merge_section(&mut self.encryption, other.encryption, EncryptionConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}
