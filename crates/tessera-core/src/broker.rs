// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Credential broker: tenant identifier in, tenant-tagged credentials out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::credentials::{ScopedAccessContext, ScopedCredentialSet, TemporaryCredentials};
use crate::error::TesseraResult;
use crate::tenant::{SessionTag, TenantId};

/// Fixed lifetime of every minted credential.
pub const SESSION_DURATION: Duration = Duration::from_secs(900);

/// Prefix of the role session name, visible in CloudTrail.
pub const SESSION_NAME_PREFIX: &str = "tenant-session-";

const MAX_SESSION_NAME_LEN: usize = 64;

/// A role-assumption request for the fixed downstream role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
	pub role_arn: String,
	pub session_name: String,
	pub duration: Duration,
	pub tags: Vec<SessionTag>,
}

/// The trust broker the credential broker delegates to (STS in production).
#[async_trait]
pub trait TrustBroker: Send + Sync {
	async fn assume_role(&self, request: AssumeRoleRequest) -> TesseraResult<TemporaryCredentials>;
}

/// Mints tenant-scoped credentials for one downstream role.
///
/// Holds an injected, process-wide trust broker client; no state is kept
/// between calls.
#[derive(Clone)]
pub struct CredentialBroker {
	trust: Arc<dyn TrustBroker>,
	role_arn: String,
}

impl CredentialBroker {
	pub fn new(trust: Arc<dyn TrustBroker>, role_arn: impl Into<String>) -> Self {
		Self {
			trust,
			role_arn: role_arn.into(),
		}
	}

	pub fn role_arn(&self) -> &str {
		&self.role_arn
	}

	/// Mint credentials for `tenant_id`.
	///
	/// An empty identifier fails with `InvalidArgument` before the trust
	/// broker is contacted. Broker rejections are returned as-is, without
	/// retry.
	#[instrument(skip(self), fields(role_arn = %self.role_arn))]
	pub async fn mint(&self, tenant_id: &str) -> TesseraResult<ScopedCredentialSet> {
		let tenant_id = TenantId::parse(tenant_id)?;
		let request = AssumeRoleRequest {
			role_arn: self.role_arn.clone(),
			session_name: session_name(&tenant_id),
			duration: SESSION_DURATION,
			tags: vec![SessionTag::tenant(&tenant_id)],
		};

		let credentials = match self.trust.assume_role(request).await {
			Ok(credentials) => credentials,
			Err(e) => {
				warn!(tenant_id = %tenant_id, error = %e, "role assumption rejected");
				return Err(e);
			}
		};

		info!(
			tenant_id = %tenant_id,
			access_key_id = %credentials.access_key_id,
			expiration = %credentials.expiration,
			"minted tenant-scoped credentials"
		);

		Ok(ScopedCredentialSet::new(tenant_id, credentials))
	}

	/// Mint credentials and wrap them in a [`ScopedAccessContext`].
	pub async fn open_session(&self, tenant_id: &str) -> TesseraResult<ScopedAccessContext> {
		Ok(ScopedAccessContext::new(self.mint(tenant_id).await?))
	}
}

/// Human-diagnosable role session name for a tenant.
///
/// Characters STS rejects are replaced with `-`; the result is capped at the
/// 64 character session-name limit.
pub fn session_name(tenant_id: &TenantId) -> String {
	let sanitized: String = tenant_id
		.as_str()
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || "+=,.@_-".contains(c) {
				c
			} else {
				'-'
			}
		})
		.collect();
	let mut name = format!("{SESSION_NAME_PREFIX}{sanitized}");
	name.truncate(MAX_SESSION_NAME_LEN);
	name
}
