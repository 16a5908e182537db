// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Policy Model.
//!
//! The two IAM documents that carry tenant isolation, a validator that checks
//! a document still preserves it, and an evaluator used by the in-memory
//! cloud to enforce it. Application code never consults these at request
//! time against the real platform; the platform's permission engine does.

mod document;
mod engine;
mod validate;

pub use document::{
	request_tag_key, resource_access_policy, trust_policy, ConditionBlock, Effect, OneOrMany,
	PolicyDocument, Principal, Statement, KEY_ACTIONS, KMS_CONTEXT_CONDITION,
	LEADING_KEYS_CONDITION, NON_EMPTY_PATTERN, POLICY_VERSION, REQUEST_TAG_CONDITION,
	TABLE_ACTIONS, TENANT_TAG_VARIABLE, TRUST_ACTIONS,
};
pub use engine::{evaluate, resolve_variables, wildcard_match, Decision, RequestContext};
pub use validate::{check_resource_access_policy, check_trust_policy, validate_policies, PolicyViolation};
