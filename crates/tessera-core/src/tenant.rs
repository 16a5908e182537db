// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tenant identity and the values bound to it.
//!
//! - [`TenantId`]: validated, opaque tenant identifier from the trust boundary
//! - [`SessionTag`]: the `TenantID` tag embedded into a credential at mint time
//! - [`EncryptionContext`]: `{tenant_id: ...}` authenticated context for KMS
//! - [`TenantRecord`]: the single item a tenant owns in the shared table

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TesseraError, TesseraResult};

/// Name of the table's partition attribute. Always holds the tenant id.
pub const PARTITION_ATTRIBUTE: &str = "tenant_id";

/// Session tag key the resource-access policy conditions on.
pub const TENANT_TAG_KEY: &str = "TenantID";

/// Encryption-context key the KMS condition compares to the session tag.
pub const ENCRYPTION_CONTEXT_KEY: &str = "tenant_id";

/// Opaque tenant identifier.
///
/// Construction is the only validation point: an empty identifier never
/// reaches the trust broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
	/// Session tag values are limited to 256 characters.
	pub const MAX_LEN: usize = 256;

	pub fn parse(value: impl Into<String>) -> TesseraResult<Self> {
		let value = value.into();
		if value.is_empty() {
			return Err(TesseraError::InvalidArgument(
				"tenant_id missing".to_string(),
			));
		}
		if value.chars().count() > Self::MAX_LEN {
			return Err(TesseraError::InvalidArgument(format!(
				"tenant_id exceeds {} characters",
				Self::MAX_LEN
			)));
		}
		Ok(Self(value))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TenantId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for TenantId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// A session tag attached to a temporary credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTag {
	pub key: String,
	pub value: String,
}

impl SessionTag {
	/// The single tag every tenant-scoped credential carries.
	pub fn tenant(tenant_id: &TenantId) -> Self {
		Self {
			key: TENANT_TAG_KEY.to_string(),
			value: tenant_id.as_str().to_string(),
		}
	}
}

/// Non-secret authenticated context bound to every data key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptionContext(BTreeMap<String, String>);

impl EncryptionContext {
	pub fn for_tenant(tenant_id: &TenantId) -> Self {
		let mut map = BTreeMap::new();
		map.insert(
			ENCRYPTION_CONTEXT_KEY.to_string(),
			tenant_id.as_str().to_string(),
		);
		Self(map)
	}

	pub fn from_map(map: BTreeMap<String, String>) -> Self {
		Self(map)
	}

	pub fn tenant_id(&self) -> Option<&str> {
		self.0.get(ENCRYPTION_CONTEXT_KEY).map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
		self.0.iter()
	}

	/// Deterministic byte encoding, used as AEAD associated data.
	pub fn canonical_bytes(&self) -> Vec<u8> {
		let mut out = Vec::new();
		for (key, value) in &self.0 {
			out.extend_from_slice(&(key.len() as u32).to_be_bytes());
			out.extend_from_slice(key.as_bytes());
			out.extend_from_slice(&(value.len() as u32).to_be_bytes());
			out.extend_from_slice(value.as_bytes());
		}
		out
	}
}

/// Caller-supplied field mapping for a write.
pub type TenantData = Map<String, Value>;

/// Parse an inbound write body.
///
/// Runs before any tenant-scoped component is constructed. Anything other
/// than a JSON object is rejected, as is an object with an empty field name,
/// which the table cannot store.
pub fn parse_tenant_data(body: &[u8]) -> TesseraResult<TenantData> {
	let value: Value = serde_json::from_slice(body)
		.map_err(|e| TesseraError::BadRequest(format!("invalid tenant data: {e}")))?;
	let Value::Object(map) = value else {
		return Err(TesseraError::BadRequest(
			"invalid tenant data: expected a JSON object".to_string(),
		));
	};
	if map.contains_key("") {
		return Err(TesseraError::BadRequest(
			"invalid tenant data: field names must not be empty".to_string(),
		));
	}
	Ok(map)
}

/// One tenant's record: field name to value, keyed by [`PARTITION_ATTRIBUTE`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantRecord(Map<String, Value>);

impl TenantRecord {
	pub fn empty() -> Self {
		Self::default()
	}

	/// Merge caller data with the partition attribute forced to `tenant_id`.
	///
	/// Any partition value in `data` is overwritten.
	pub fn for_tenant(tenant_id: &TenantId, data: TenantData) -> Self {
		let mut fields = data;
		fields.insert(
			PARTITION_ATTRIBUTE.to_string(),
			Value::String(tenant_id.as_str().to_string()),
		);
		Self(fields)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn get(&self, field: &str) -> Option<&Value> {
		self.0.get(field)
	}

	pub fn tenant_id(&self) -> Option<&str> {
		self.0.get(PARTITION_ATTRIBUTE).and_then(Value::as_str)
	}

	pub fn fields(&self) -> &Map<String, Value> {
		&self.0
	}
}

impl From<Map<String, Value>> for TenantRecord {
	fn from(fields: Map<String, Value>) -> Self {
		Self(fields)
	}
}
