// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Temporary credentials and the scoped access context that owns them.

use chrono::{DateTime, Utc};
use tessera_common_secret::SecretString;

use crate::tenant::{EncryptionContext, SessionTag, TenantId};

/// Raw temporary credentials as returned by the trust broker.
#[derive(Debug, Clone)]
pub struct TemporaryCredentials {
	pub access_key_id: String,
	pub secret_access_key: SecretString,
	pub session_token: SecretString,
	pub expiration: DateTime<Utc>,
}

impl TemporaryCredentials {
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		now >= self.expiration
	}
}

/// Tenant-tagged temporary credentials, minted once per request.
///
/// The tag is fixed at mint time; there is no way to change it afterwards.
/// Never persisted and never shared between tenants.
#[derive(Debug)]
pub struct ScopedCredentialSet {
	tenant_id: TenantId,
	session_tag: SessionTag,
	credentials: TemporaryCredentials,
}

impl ScopedCredentialSet {
	pub(crate) fn new(tenant_id: TenantId, credentials: TemporaryCredentials) -> Self {
		let session_tag = SessionTag::tenant(&tenant_id);
		Self {
			tenant_id,
			session_tag,
			credentials,
		}
	}

	pub fn tenant_id(&self) -> &TenantId {
		&self.tenant_id
	}

	pub fn session_tag(&self) -> &SessionTag {
		&self.session_tag
	}

	pub fn access_key_id(&self) -> &str {
		&self.credentials.access_key_id
	}

	pub fn expiration(&self) -> DateTime<Utc> {
		self.credentials.expiration
	}
}

/// Immutable handle downstream clients authenticate with.
///
/// Built from a [`ScopedCredentialSet`] and owns it for its whole lifetime;
/// dropping the context discards the credentials. There is no refresh: a
/// request that outlives the TTL fails downstream with
/// [`ExpiredCredentials`](crate::TesseraError::ExpiredCredentials).
#[derive(Debug)]
pub struct ScopedAccessContext {
	scope: ScopedCredentialSet,
	encryption_context: EncryptionContext,
}

impl ScopedAccessContext {
	pub fn new(scope: ScopedCredentialSet) -> Self {
		let encryption_context = EncryptionContext::for_tenant(&scope.tenant_id);
		Self {
			scope,
			encryption_context,
		}
	}

	pub fn tenant_id(&self) -> &TenantId {
		&self.scope.tenant_id
	}

	pub fn session_tag(&self) -> &SessionTag {
		&self.scope.session_tag
	}

	/// Encryption context for every KMS call made under these credentials.
	///
	/// Derived from the same tenant id as the session tag.
	pub fn encryption_context(&self) -> &EncryptionContext {
		&self.encryption_context
	}

	/// Authentication handle for constructing downstream clients.
	pub fn credentials(&self) -> &TemporaryCredentials {
		&self.scope.credentials
	}

	pub fn expiration(&self) -> DateTime<Utc> {
		self.scope.expiration()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;

	fn credentials(expiration: DateTime<Utc>) -> TemporaryCredentials {
		TemporaryCredentials {
			access_key_id: "ASIAEXAMPLE".to_string(),
			secret_access_key: SecretString::new("secret".to_string()),
			session_token: SecretString::new("token".to_string()),
			expiration,
		}
	}

	#[test]
	fn context_binds_tag_and_encryption_context_to_same_tenant() {
		let tenant = TenantId::parse("tenantA").unwrap();
		let scope = ScopedCredentialSet::new(tenant, credentials(Utc::now()));
		let context = ScopedAccessContext::new(scope);

		assert_eq!(context.tenant_id().as_str(), "tenantA");
		assert_eq!(context.session_tag().value, "tenantA");
		assert_eq!(context.encryption_context().tenant_id(), Some("tenantA"));
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let tenant = TenantId::parse("tenantA").unwrap();
		let scope = ScopedCredentialSet::new(tenant, credentials(Utc::now()));
		let rendered = format!("{:?}", ScopedAccessContext::new(scope));
		assert!(rendered.contains("ASIAEXAMPLE"));
		assert!(!rendered.contains("\"secret\""));
		assert!(!rendered.contains("\"token\""));
		assert!(rendered.contains("[REDACTED]"));
	}

	#[test]
	fn expiry_is_inclusive() {
		let now = Utc::now();
		let creds = credentials(now);
		assert!(creds.is_expired_at(now));
		assert!(!creds.is_expired_at(now - Duration::seconds(1)));
	}
}
