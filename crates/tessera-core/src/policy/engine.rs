// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Policy evaluation.
//!
//! Implements the subset of IAM semantics the tenant isolation documents
//! rely on:
//!
//! 1. A request is allowed only if some `Allow` statement matches and no
//!    `Deny` statement does (explicit deny wins, implicit deny otherwise).
//! 2. A statement matches when its principal, action, resource and every
//!    condition match. Unknown condition operators never match.
//! 3. `${aws:PrincipalTag/<key>}` in condition values resolves to the
//!    caller's session tag; an unresolvable variable never matches.

use std::collections::BTreeMap;

use tracing::instrument;

use super::document::{Effect, PolicyDocument, Statement};

/// Attributes of one request, as the permission engine sees them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
	pub principal: Option<String>,
	pub action: String,
	pub resource: Option<String>,
	/// Session tags of the calling principal.
	pub principal_tags: BTreeMap<String, String>,
	/// Request-supplied condition keys, e.g. `dynamodb:LeadingKeys`.
	pub keys: BTreeMap<String, Vec<String>>,
}

impl RequestContext {
	pub fn new(action: impl Into<String>) -> Self {
		Self {
			action: action.into(),
			..Default::default()
		}
	}

	pub fn on(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());
		self
	}

	pub fn by(mut self, principal: impl Into<String>) -> Self {
		self.principal = Some(principal.into());
		self
	}

	pub fn with_principal_tags(mut self, tags: BTreeMap<String, String>) -> Self {
		self.principal_tags = tags;
		self
	}

	pub fn with_key(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
		self.keys.insert(key.into(), values);
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
	Allow,
	ImplicitDeny,
	ExplicitDeny,
}

impl Decision {
	pub fn is_allowed(self) -> bool {
		self == Decision::Allow
	}
}

#[instrument(level = "debug", skip(document, request), fields(action = %request.action))]
pub fn evaluate(document: &PolicyDocument, request: &RequestContext) -> Decision {
	let mut allowed = false;
	for statement in &document.statement {
		if !statement_matches(statement, request) {
			continue;
		}
		match statement.effect {
			Effect::Deny => return Decision::ExplicitDeny,
			Effect::Allow => allowed = true,
		}
	}
	if allowed {
		Decision::Allow
	} else {
		Decision::ImplicitDeny
	}
}

fn statement_matches(statement: &Statement, request: &RequestContext) -> bool {
	if let Some(principal) = &statement.principal {
		let Some(caller) = &request.principal else {
			return false;
		};
		if !principal
			.aws
			.values()
			.iter()
			.any(|p| p == "*" || p == caller)
		{
			return false;
		}
	}

	// Action names are case-insensitive in IAM.
	let action = request.action.to_ascii_lowercase();
	if !statement
		.actions()
		.iter()
		.any(|pattern| wildcard_match(&pattern.to_ascii_lowercase(), &action))
	{
		return false;
	}

	if let Some(resources) = &statement.resource {
		let Some(resource) = &request.resource else {
			return false;
		};
		if !resources
			.values()
			.iter()
			.any(|pattern| wildcard_match(pattern, resource))
		{
			return false;
		}
	}

	statement.condition.iter().all(|(operator, keys)| {
		keys.iter()
			.all(|(key, values)| condition_holds(operator, key, values.values(), request))
	})
}

fn condition_holds(operator: &str, key: &str, policy_values: &[String], request: &RequestContext) -> bool {
	let resolved: Vec<String> = policy_values
		.iter()
		.filter_map(|value| resolve_variables(value, &request.principal_tags))
		.collect();
	let request_values = request.keys.get(key).map(Vec::as_slice).unwrap_or(&[]);

	match operator {
		"StringEquals" => {
			!request_values.is_empty()
				&& request_values
					.iter()
					.all(|value| resolved.iter().any(|p| p == value))
		}
		"StringLike" => {
			!request_values.is_empty()
				&& request_values
					.iter()
					.all(|value| resolved.iter().any(|p| wildcard_match(p, value)))
		}
		// True for an absent key, as in IAM. Only request shapes that always
		// carry the key may rely on this operator.
		"ForAllValues:StringEquals" => request_values
			.iter()
			.all(|value| resolved.iter().any(|p| p == value)),
		"ForAnyValue:StringEquals" => request_values
			.iter()
			.any(|value| resolved.iter().any(|p| p == value)),
		_ => false,
	}
}

/// Substitute `${aws:PrincipalTag/<key>}` references. `None` if a referenced
/// tag is absent.
pub fn resolve_variables(value: &str, tags: &BTreeMap<String, String>) -> Option<String> {
	const OPEN: &str = "${aws:PrincipalTag/";
	let mut out = String::with_capacity(value.len());
	let mut rest = value;
	while let Some(start) = rest.find(OPEN) {
		out.push_str(&rest[..start]);
		let after = &rest[start + OPEN.len()..];
		let end = after.find('}')?;
		out.push_str(tags.get(&after[..end])?);
		rest = &after[end + 1..];
	}
	out.push_str(rest);
	Some(out)
}

/// Glob match where `*` matches any run of characters and `?` exactly one.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
	let pattern: Vec<char> = pattern.chars().collect();
	let value: Vec<char> = value.chars().collect();
	let (mut p, mut v) = (0, 0);
	let mut star: Option<(usize, usize)> = None;

	while v < value.len() {
		if p < pattern.len() && (pattern[p] == '?' || pattern[p] == value[v]) {
			p += 1;
			v += 1;
		} else if p < pattern.len() && pattern[p] == '*' {
			star = Some((p, v));
			p += 1;
		} else if let Some((star_p, star_v)) = star {
			p = star_p + 1;
			v = star_v + 1;
			star = Some((star_p, star_v + 1));
		} else {
			return false;
		}
	}
	pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::policy::document::{
		resource_access_policy, trust_policy, KMS_CONTEXT_CONDITION, LEADING_KEYS_CONDITION,
		REQUEST_TAG_CONDITION,
	};
	use proptest::prelude::*;

	const TABLE: &str = "arn:aws:dynamodb:us-east-1:123456789012:table/tenants";
	const KEY: &str = "arn:aws:kms:us-east-1:123456789012:key/1234abcd";
	const BROKER: &str = "arn:aws:iam::123456789012:role/broker";

	fn tags(tenant: &str) -> BTreeMap<String, String> {
		BTreeMap::from([("TenantID".to_string(), tenant.to_string())])
	}

	fn table_request(tenant_tag: &str, leading_key: &str) -> RequestContext {
		RequestContext::new("dynamodb:GetItem")
			.on(TABLE)
			.with_principal_tags(tags(tenant_tag))
			.with_key(LEADING_KEYS_CONDITION, vec![leading_key.to_string()])
	}

	fn kms_request(tenant_tag: &str, context_tenant: &str) -> RequestContext {
		RequestContext::new("kms:Decrypt")
			.on(KEY)
			.with_principal_tags(tags(tenant_tag))
			.with_key(KMS_CONTEXT_CONDITION, vec![context_tenant.to_string()])
	}

	mod resource_access {
		use super::*;

		#[test]
		fn own_partition_is_allowed() {
			let doc = resource_access_policy(TABLE, KEY);
			assert_eq!(evaluate(&doc, &table_request("tenantA", "tenantA")), Decision::Allow);
		}

		#[test]
		fn other_partition_is_denied() {
			let doc = resource_access_policy(TABLE, KEY);
			assert_eq!(
				evaluate(&doc, &table_request("tenantA", "tenantB")),
				Decision::ImplicitDeny
			);
		}

		#[test]
		fn untagged_principal_is_denied() {
			let doc = resource_access_policy(TABLE, KEY);
			let request = table_request("tenantA", "tenantA").with_principal_tags(BTreeMap::new());
			assert!(!evaluate(&doc, &request).is_allowed());
		}

		#[test]
		fn key_usage_requires_matching_context() {
			let doc = resource_access_policy(TABLE, KEY);
			assert!(evaluate(&doc, &kms_request("tenantA", "tenantA")).is_allowed());
			assert!(!evaluate(&doc, &kms_request("tenantA", "tenantB")).is_allowed());
		}

		#[test]
		fn key_usage_without_context_is_denied() {
			let doc = resource_access_policy(TABLE, KEY);
			let request = RequestContext::new("kms:GenerateDataKey")
				.on(KEY)
				.with_principal_tags(tags("tenantA"));
			assert!(!evaluate(&doc, &request).is_allowed());
		}

		#[test]
		fn unlisted_action_is_denied() {
			let doc = resource_access_policy(TABLE, KEY);
			let request = RequestContext::new("dynamodb:Scan")
				.on(TABLE)
				.with_principal_tags(tags("tenantA"));
			assert_eq!(evaluate(&doc, &request), Decision::ImplicitDeny);
		}

		#[test]
		fn other_table_is_denied() {
			let doc = resource_access_policy(TABLE, KEY);
			let request = table_request("tenantA", "tenantA")
				.on("arn:aws:dynamodb:us-east-1:123456789012:table/other");
			assert!(!evaluate(&doc, &request).is_allowed());
		}
	}

	mod trust {
		use super::*;

		fn assume(principal: &str, tag: Option<&str>) -> RequestContext {
			let request = RequestContext::new("sts:AssumeRole").by(principal);
			match tag {
				Some(tag) => request.with_key(REQUEST_TAG_CONDITION, vec![tag.to_string()]),
				None => request,
			}
		}

		#[test]
		fn tagged_assumption_by_trusted_principal_is_allowed() {
			let doc = trust_policy(BROKER);
			assert!(evaluate(&doc, &assume(BROKER, Some("tenantA"))).is_allowed());
		}

		#[test]
		fn untagged_assumption_is_denied() {
			let doc = trust_policy(BROKER);
			assert!(!evaluate(&doc, &assume(BROKER, None)).is_allowed());
		}

		#[test]
		fn empty_tag_is_denied() {
			let doc = trust_policy(BROKER);
			assert!(!evaluate(&doc, &assume(BROKER, Some(""))).is_allowed());
		}

		#[test]
		fn untrusted_principal_is_denied() {
			let doc = trust_policy(BROKER);
			let other = "arn:aws:iam::123456789012:role/other";
			assert!(!evaluate(&doc, &assume(other, Some("tenantA"))).is_allowed());
		}
	}

	#[test]
	fn explicit_deny_wins() {
		let mut doc = resource_access_policy(TABLE, KEY);
		let mut deny = doc.statement[0].clone();
		deny.effect = Effect::Deny;
		deny.condition.clear();
		doc.statement.push(deny);
		assert_eq!(
			evaluate(&doc, &table_request("tenantA", "tenantA")),
			Decision::ExplicitDeny
		);
	}

	#[test]
	fn unknown_operator_never_matches() {
		let mut doc = resource_access_policy(TABLE, KEY);
		let condition = doc.statement[0].condition.remove("ForAllValues:StringEquals").unwrap();
		doc.statement[0]
			.condition
			.insert("NumericLessThan".to_string(), condition);
		assert!(!evaluate(&doc, &table_request("tenantA", "tenantA")).is_allowed());
	}

	#[test]
	fn variables_resolve_from_tags() {
		let tags = tags("tenantA");
		assert_eq!(
			resolve_variables("${aws:PrincipalTag/TenantID}", &tags),
			Some("tenantA".to_string())
		);
		assert_eq!(
			resolve_variables("prefix-${aws:PrincipalTag/TenantID}-suffix", &tags),
			Some("prefix-tenantA-suffix".to_string())
		);
		assert_eq!(resolve_variables("${aws:PrincipalTag/Other}", &tags), None);
		assert_eq!(resolve_variables("literal", &tags), Some("literal".to_string()));
	}

	#[test]
	fn wildcard_matching() {
		assert!(wildcard_match("*", ""));
		assert!(wildcard_match("?*", "a"));
		assert!(!wildcard_match("?*", ""));
		assert!(wildcard_match("dynamodb:*", "dynamodb:getitem"));
		assert!(wildcard_match("arn:*:table/t?", "arn:aws:table/t1"));
		assert!(!wildcard_match("arn:*:table/t?", "arn:aws:table/t12"));
	}

	proptest! {
		#[test]
		fn prop_cross_tenant_table_access_is_denied(
			own in "[a-zA-Z0-9_-]{1,32}",
			other in "[a-zA-Z0-9_-]{1,32}",
		) {
			prop_assume!(own != other);
			let doc = resource_access_policy(TABLE, KEY);
			prop_assert!(evaluate(&doc, &table_request(&own, &own)).is_allowed());
			prop_assert!(!evaluate(&doc, &table_request(&own, &other)).is_allowed());
			prop_assert!(!evaluate(&doc, &kms_request(&own, &other)).is_allowed());
		}

		#[test]
		fn prop_star_matches_everything(value in ".*") {
			prop_assert!(wildcard_match("*", &value));
		}
	}
}
