// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Structural checks that a policy document still isolates tenants.

use thiserror::Error;

use super::document::{
	Effect, PolicyDocument, Statement, KMS_CONTEXT_CONDITION, LEADING_KEYS_CONDITION,
	REQUEST_TAG_CONDITION, TENANT_TAG_VARIABLE,
};
use super::engine::wildcard_match;
use crate::error::{TesseraError, TesseraResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
	#[error("policy has no statements")]
	Empty,

	#[error("statement {sid} grants table access without a LeadingKeys condition on the TenantID tag")]
	UnscopedTableAccess { sid: String },

	#[error("statement {sid} grants key usage without an encryption context condition on the TenantID tag")]
	UnscopedKeyUsage { sid: String },

	#[error("statement {sid} allows role assumption without requiring a TenantID session tag")]
	UntaggedAssumption { sid: String },

	#[error("no statement allows sts:TagSession")]
	MissingTagSession,

	#[error("no statement allows sts:AssumeRole")]
	MissingAssumeRole,
}

/// Check the downstream role's permission policy.
///
/// Every `Allow` statement that reaches the table must carry
/// `ForAllValues:StringEquals dynamodb:LeadingKeys = [${aws:PrincipalTag/TenantID}]`;
/// every one that reaches the key must carry
/// `StringEquals kms:EncryptionContext:tenant_id = ${aws:PrincipalTag/TenantID}`.
pub fn check_resource_access_policy(document: &PolicyDocument) -> Vec<PolicyViolation> {
	if document.statement.is_empty() {
		return vec![PolicyViolation::Empty];
	}

	let mut violations = Vec::new();
	for (index, statement) in allow_statements(document) {
		let sid = sid(statement, index);
		if grants_service(statement, "dynamodb")
			&& !condition_is_tag(statement, "ForAllValues:StringEquals", LEADING_KEYS_CONDITION)
		{
			violations.push(PolicyViolation::UnscopedTableAccess { sid: sid.clone() });
		}
		if grants_service(statement, "kms")
			&& !condition_is_tag(statement, "StringEquals", KMS_CONTEXT_CONDITION)
		{
			violations.push(PolicyViolation::UnscopedKeyUsage { sid });
		}
	}
	violations
}

/// Check the downstream role's trust policy: assumption must be possible, and
/// only with a non-empty `TenantID` request tag.
pub fn check_trust_policy(document: &PolicyDocument) -> Vec<PolicyViolation> {
	if document.statement.is_empty() {
		return vec![PolicyViolation::Empty];
	}

	let mut violations = Vec::new();
	let mut assume_allowed = false;
	let mut tag_session_allowed = false;

	for (index, statement) in allow_statements(document) {
		let assumes = grants_action(statement, "sts:AssumeRole");
		assume_allowed |= assumes;
		tag_session_allowed |= grants_action(statement, "sts:TagSession");

		if assumes && !requires_tenant_tag(statement) {
			violations.push(PolicyViolation::UntaggedAssumption {
				sid: sid(statement, index),
			});
		}
	}

	if !assume_allowed {
		violations.push(PolicyViolation::MissingAssumeRole);
	}
	if !tag_session_allowed {
		violations.push(PolicyViolation::MissingTagSession);
	}
	violations
}

/// Run both checks and fold any violation into a configuration error.
pub fn validate_policies(resource_access: &PolicyDocument, trust: &PolicyDocument) -> TesseraResult<()> {
	let violations: Vec<String> = check_resource_access_policy(resource_access)
		.into_iter()
		.chain(check_trust_policy(trust))
		.map(|v| v.to_string())
		.collect();

	if violations.is_empty() {
		Ok(())
	} else {
		Err(TesseraError::configuration(
			"validate_policies",
			violations.join("; "),
		))
	}
}

fn allow_statements(document: &PolicyDocument) -> impl Iterator<Item = (usize, &Statement)> {
	document
		.statement
		.iter()
		.enumerate()
		.filter(|(_, s)| s.effect == Effect::Allow)
}

fn sid(statement: &Statement, index: usize) -> String {
	statement
		.sid
		.clone()
		.unwrap_or_else(|| format!("#{index}"))
}

fn grants_service(statement: &Statement, service: &str) -> bool {
	statement.actions().iter().any(|action| {
		let action = action.to_ascii_lowercase();
		action == "*" || action.split(':').next() == Some(service)
	})
}

fn grants_action(statement: &Statement, action: &str) -> bool {
	let action = action.to_ascii_lowercase();
	statement
		.actions()
		.iter()
		.any(|pattern| wildcard_match(&pattern.to_ascii_lowercase(), &action))
}

fn condition_is_tag(statement: &Statement, operator: &str, key: &str) -> bool {
	matches!(
		statement.condition_values(operator, key),
		Some([value]) if value == TENANT_TAG_VARIABLE
	)
}

fn requires_tenant_tag(statement: &Statement) -> bool {
	match statement.condition_values("StringLike", REQUEST_TAG_CONDITION) {
		Some(patterns) if !patterns.is_empty() => {
			patterns.iter().all(|p| !wildcard_match(p, ""))
		}
		_ => statement
			.condition_values("StringEquals", REQUEST_TAG_CONDITION)
			.is_some_and(|values| !values.is_empty() && values.iter().all(|v| !v.is_empty())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::policy::document::{resource_access_policy, trust_policy};

	const TABLE: &str = "arn:aws:dynamodb:us-east-1:123456789012:table/tenants";
	const KEY: &str = "arn:aws:kms:us-east-1:123456789012:key/1234abcd";
	const BROKER: &str = "arn:aws:iam::123456789012:role/broker";

	#[test]
	fn rendered_documents_are_valid() {
		assert!(check_resource_access_policy(&resource_access_policy(TABLE, KEY)).is_empty());
		assert!(check_trust_policy(&trust_policy(BROKER)).is_empty());
		assert!(validate_policies(&resource_access_policy(TABLE, KEY), &trust_policy(BROKER)).is_ok());
	}

	#[test]
	fn dropping_leading_keys_condition_is_flagged() {
		let mut doc = resource_access_policy(TABLE, KEY);
		doc.statement[0].condition.clear();
		assert_eq!(
			check_resource_access_policy(&doc),
			vec![PolicyViolation::UnscopedTableAccess {
				sid: "TenantScopedTableAccess".to_string()
			}]
		);
	}

	#[test]
	fn literal_tenant_in_condition_is_flagged() {
		let raw = r#"{
			"Version": "2012-10-17",
			"Statement": [{
				"Effect": "Allow",
				"Action": "kms:*",
				"Resource": "*",
				"Condition": {"StringEquals": {"kms:EncryptionContext:tenant_id": "tenantA"}}
			}]
		}"#;
		let doc: PolicyDocument = serde_json::from_str(raw).unwrap();
		assert_eq!(
			check_resource_access_policy(&doc),
			vec![PolicyViolation::UnscopedKeyUsage {
				sid: "#0".to_string()
			}]
		);
	}

	#[test]
	fn wildcard_action_needs_both_conditions() {
		let raw = r#"{
			"Version": "2012-10-17",
			"Statement": [{"Effect": "Allow", "Action": "*", "Resource": "*"}]
		}"#;
		let doc: PolicyDocument = serde_json::from_str(raw).unwrap();
		assert_eq!(check_resource_access_policy(&doc).len(), 2);
	}

	#[test]
	fn trust_policy_accepting_empty_tags_is_flagged() {
		let mut doc = trust_policy(BROKER);
		doc.statement[0]
			.condition
			.get_mut("StringLike")
			.unwrap()
			.insert(REQUEST_TAG_CONDITION.to_string(), "*".into());
		assert_eq!(
			check_trust_policy(&doc),
			vec![PolicyViolation::UntaggedAssumption {
				sid: "AssumeWithTenantTag".to_string()
			}]
		);
	}

	#[test]
	fn trust_policy_without_tag_session_is_flagged() {
		let mut doc = trust_policy(BROKER);
		doc.statement[0].action = "sts:AssumeRole".into();
		assert_eq!(
			check_trust_policy(&doc),
			vec![PolicyViolation::MissingTagSession]
		);
	}

	#[test]
	fn validate_policies_reports_configuration_error() {
		let mut resource = resource_access_policy(TABLE, KEY);
		resource.statement[1].condition.clear();
		let err = validate_policies(&resource, &trust_policy(BROKER)).unwrap_err();
		assert!(matches!(err, TesseraError::Configuration { .. }));
		assert!(err.to_string().contains("TenantScopedKeyUsage"));
	}

	#[test]
	fn empty_documents_are_flagged() {
		let doc = PolicyDocument::new(Vec::new());
		assert_eq!(check_resource_access_policy(&doc), vec![PolicyViolation::Empty]);
		assert_eq!(check_trust_policy(&doc), vec![PolicyViolation::Empty]);
	}
}
