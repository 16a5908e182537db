// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! IAM policy documents and the two documents that isolate tenants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tenant::TENANT_TAG_KEY;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Policy variable resolved to the caller's own `TenantID` session tag.
pub const TENANT_TAG_VARIABLE: &str = "${aws:PrincipalTag/TenantID}";

pub const LEADING_KEYS_CONDITION: &str = "dynamodb:LeadingKeys";
pub const KMS_CONTEXT_CONDITION: &str = "kms:EncryptionContext:tenant_id";
pub const REQUEST_TAG_CONDITION: &str = "aws:RequestTag/TenantID";

/// `StringLike` pattern for "any non-empty value".
pub const NON_EMPTY_PATTERN: &str = "?*";

pub const TABLE_ACTIONS: [&str; 2] = ["dynamodb:GetItem", "dynamodb:PutItem"];
pub const KEY_ACTIONS: [&str; 2] = ["kms:Decrypt", "kms:GenerateDataKey"];
pub const TRUST_ACTIONS: [&str; 2] = ["sts:AssumeRole", "sts:TagSession"];

/// IAM allows a bare string wherever a list is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
	One(String),
	Many(Vec<String>),
}

impl OneOrMany {
	pub fn values(&self) -> &[String] {
		match self {
			Self::One(value) => std::slice::from_ref(value),
			Self::Many(values) => values,
		}
	}
}

impl From<&str> for OneOrMany {
	fn from(value: &str) -> Self {
		Self::One(value.to_string())
	}
}

impl<const N: usize> From<[&str; N]> for OneOrMany {
	fn from(values: [&str; N]) -> Self {
		Self::Many(values.iter().map(|v| v.to_string()).collect())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
	Allow,
	Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	#[serde(rename = "AWS")]
	pub aws: OneOrMany,
}

/// Operator → condition key → accepted values.
pub type ConditionBlock = BTreeMap<String, BTreeMap<String, OneOrMany>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sid: Option<String>,
	pub effect: Effect,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub principal: Option<Principal>,
	pub action: OneOrMany,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resource: Option<OneOrMany>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub condition: ConditionBlock,
}

impl Statement {
	fn allow(sid: &str, action: impl Into<OneOrMany>) -> Self {
		Self {
			sid: Some(sid.to_string()),
			effect: Effect::Allow,
			principal: None,
			action: action.into(),
			resource: None,
			condition: ConditionBlock::new(),
		}
	}

	fn on(mut self, resource: &str) -> Self {
		self.resource = Some(OneOrMany::from(resource));
		self
	}

	fn for_principal(mut self, arn: &str) -> Self {
		self.principal = Some(Principal {
			aws: OneOrMany::from(arn),
		});
		self
	}

	fn when(mut self, operator: &str, key: &str, values: impl Into<OneOrMany>) -> Self {
		self.condition
			.entry(operator.to_string())
			.or_default()
			.insert(key.to_string(), values.into());
		self
	}

	pub fn actions(&self) -> &[String] {
		self.action.values()
	}

	/// Condition values for `operator` / `key`, if present.
	pub fn condition_values(&self, operator: &str, key: &str) -> Option<&[String]> {
		self.condition
			.get(operator)
			.and_then(|keys| keys.get(key))
			.map(OneOrMany::values)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
	pub version: String,
	pub statement: Vec<Statement>,
}

impl PolicyDocument {
	pub fn new(statement: Vec<Statement>) -> Self {
		Self {
			version: POLICY_VERSION.to_string(),
			statement,
		}
	}

	pub fn to_json_pretty(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}
}

/// Permission policy of the downstream role.
///
/// Table access is allowed only when every leading key of the request equals
/// the caller's own `TenantID` tag; key usage only when the encryption
/// context's `tenant_id` equals it.
pub fn resource_access_policy(table_arn: &str, key_arn: &str) -> PolicyDocument {
	PolicyDocument::new(vec![
		Statement::allow("TenantScopedTableAccess", TABLE_ACTIONS)
			.on(table_arn)
			.when(
				"ForAllValues:StringEquals",
				LEADING_KEYS_CONDITION,
				[TENANT_TAG_VARIABLE],
			),
		Statement::allow("TenantScopedKeyUsage", KEY_ACTIONS)
			.on(key_arn)
			.when("StringEquals", KMS_CONTEXT_CONDITION, TENANT_TAG_VARIABLE),
	])
}

/// Trust policy of the downstream role.
///
/// `principal_arn` may assume the role only while tagging the session with a
/// non-empty `TenantID`, so no untagged credential for the role can exist.
pub fn trust_policy(principal_arn: &str) -> PolicyDocument {
	PolicyDocument::new(vec![Statement::allow(
		"AssumeWithTenantTag",
		TRUST_ACTIONS,
	)
	.for_principal(principal_arn)
	.when("StringLike", &request_tag_key(TENANT_TAG_KEY), NON_EMPTY_PATTERN)])
}

/// `aws:RequestTag/<key>` condition key.
pub fn request_tag_key(tag: &str) -> String {
	format!("aws:RequestTag/{tag}")
}
