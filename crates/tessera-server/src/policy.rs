// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rendering of the role's permission and trust documents for provisioning.

use serde::Serialize;
use tessera_config::AwsConfig;
use tessera_core::policy::{resource_access_policy, trust_policy, validate_policies, PolicyDocument};
use tessera_core::{TesseraError, TesseraResult};

const OPERATION: &str = "policy:render";

/// ARNs the two documents are written against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTargets {
	pub table_arn: String,
	pub key_arn: String,
	pub principal_arn: String,
}

impl PolicyTargets {
	/// Derive ARNs from configuration.
	///
	/// The account comes from the role ARN. Without a configured region the
	/// region segment is `*`. `principal_arn` defaults to the account root.
	pub fn from_config(aws: &AwsConfig, principal_arn: Option<String>) -> TesseraResult<Self> {
		let account = account_of(&aws.role_arn).ok_or_else(|| {
			TesseraError::configuration(
				OPERATION,
				format!("cannot read an account id from role ARN '{}'", aws.role_arn),
			)
		})?;
		let region = aws.region.as_deref().unwrap_or("*");

		let key_arn = if aws.key_id.starts_with("arn:") {
			aws.key_id.clone()
		} else if aws.key_id.is_empty() {
			format!("arn:aws:kms:{region}:{account}:key/*")
		} else {
			format!("arn:aws:kms:{region}:{account}:key/{}", aws.key_id)
		};

		Ok(Self {
			table_arn: format!("arn:aws:dynamodb:{region}:{account}:table/{}", aws.table_name),
			key_arn,
			principal_arn: principal_arn.unwrap_or_else(|| format!("arn:aws:iam::{account}:root")),
		})
	}
}

fn account_of(arn: &str) -> Option<&str> {
	let mut parts = arn.split(':');
	if parts.next() != Some("arn") {
		return None;
	}
	parts
		.nth(3)
		.filter(|account| !account.is_empty() && account.chars().all(|c| c.is_ascii_digit()))
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedPolicies {
	pub role_arn: String,
	pub resource_access_policy: PolicyDocument,
	pub trust_policy: PolicyDocument,
}

/// Render both documents and check they keep tenant isolation.
pub fn render(aws: &AwsConfig, targets: &PolicyTargets) -> TesseraResult<RenderedPolicies> {
	let resource = resource_access_policy(&targets.table_arn, &targets.key_arn);
	let trust = trust_policy(&targets.principal_arn);
	validate_policies(&resource, &trust)?;
	Ok(RenderedPolicies {
		role_arn: aws.role_arn.clone(),
		resource_access_policy: resource,
		trust_policy: trust,
	})
}
