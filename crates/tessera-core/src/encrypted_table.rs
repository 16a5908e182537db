// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Client-side attribute encryption for the shared table.
//!
//! [`EncryptedTable`] wraps any [`TableClient`] and implements the same
//! capability, so callers can swap encryption in and out. Each written item
//! gets its own data key from the key service, generated under the session's
//! encryption context. Non-key attributes are sealed with AES-256-GCM; the
//! wrapped data key travels with the item in [`ENVELOPE_ATTRIBUTE`].
//!
//! # Stored layout
//!
//! ```text
//! tenant_id          S  "tenantA"                 (never encrypted)
//! color              B  nonce || ciphertext       (sealed JSON of "blue")
//! __tessera_envelope M  { wrapped_key: B, context: M, encrypted: L<S>, algorithm: S }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;
use zeroize::Zeroizing;

use crate::crypto::envelope::{self, Sealed, KEY_SIZE};
use crate::error::{TesseraError, TesseraResult};
use crate::item::{AttributeValue, Item};
use crate::table::{DataKey, KeyService, TableClient};
use crate::tenant::{EncryptionContext, PARTITION_ATTRIBUTE};

/// Reserved attribute holding the item's material description.
pub const ENVELOPE_ATTRIBUTE: &str = "__tessera_envelope";

const ALGORITHM: &str = "AES256GCM";

/// What happens to an attribute on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeAction {
	Encrypt,
	Plaintext,
}

/// Per-attribute encryption actions. Everything is encrypted unless listed as
/// plaintext; the partition attribute is always plaintext.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeActions {
	plaintext: BTreeSet<String>,
}

impl AttributeActions {
	pub fn encrypt_all() -> Self {
		Self::default()
	}

	pub fn with_plaintext<I, S>(fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			plaintext: fields.into_iter().map(Into::into).collect(),
		}
	}

	pub fn action(&self, attribute: &str) -> AttributeAction {
		if attribute == PARTITION_ATTRIBUTE || self.plaintext.contains(attribute) {
			AttributeAction::Plaintext
		} else {
			AttributeAction::Encrypt
		}
	}
}

/// Key service materials bound to one session's encryption context.
///
/// Unwrapping always uses the context this provider was built with, never a
/// context recorded in a stored item.
pub struct KmsMaterialsProvider {
	keys: Arc<dyn KeyService>,
	key_id: String,
	context: EncryptionContext,
}

impl KmsMaterialsProvider {
	pub fn new(keys: Arc<dyn KeyService>, key_id: impl Into<String>, context: EncryptionContext) -> Self {
		Self {
			keys,
			key_id: key_id.into(),
			context,
		}
	}

	pub fn context(&self) -> &EncryptionContext {
		&self.context
	}

	async fn encryption_materials(&self) -> TesseraResult<DataKey> {
		self.keys.generate_data_key(&self.key_id, &self.context).await
	}

	async fn decryption_materials(&self, wrapped_key: &[u8]) -> TesseraResult<Zeroizing<[u8; KEY_SIZE]>> {
		let plaintext = self
			.keys
			.decrypt(&self.key_id, wrapped_key, &self.context)
			.await?;
		envelope::key_from_slice(&plaintext)
	}
}

/// Encrypting decorator over a [`TableClient`].
pub struct EncryptedTable {
	inner: Arc<dyn TableClient>,
	materials: KmsMaterialsProvider,
	actions: AttributeActions,
}

impl EncryptedTable {
	pub fn new(inner: Arc<dyn TableClient>, materials: KmsMaterialsProvider, actions: AttributeActions) -> Self {
		Self {
			inner,
			materials,
			actions,
		}
	}

	async fn encrypt_item(&self, mut item: Item) -> TesseraResult<Item> {
		if item.contains_key(ENVELOPE_ATTRIBUTE) {
			return Err(TesseraError::BadRequest(format!(
				"attribute name {ENVELOPE_ATTRIBUTE} is reserved"
			)));
		}

		let data_key = self.materials.encryption_materials().await?;
		let mut encrypted = Vec::new();

		for (name, value) in item.iter_mut() {
			if self.actions.action(name) == AttributeAction::Plaintext {
				continue;
			}
			let plaintext = Zeroizing::new(
				serde_json::to_vec(&value.to_json()?)
					.map_err(|e| TesseraError::Integrity(format!("encoding {name}: {e}")))?,
			);
			let sealed = envelope::seal(
				&data_key.plaintext,
				&plaintext,
				&attribute_aad(self.materials.context(), name),
			)?;
			*value = AttributeValue::B(sealed.to_bytes());
			encrypted.push(AttributeValue::S(name.clone()));
		}

		let context = self
			.materials
			.context()
			.iter()
			.map(|(k, v)| (k.clone(), AttributeValue::S(v.clone())))
			.collect();

		item.insert(
			ENVELOPE_ATTRIBUTE.to_string(),
			AttributeValue::M(BTreeMap::from([
				("algorithm".to_string(), AttributeValue::S(ALGORITHM.to_string())),
				("context".to_string(), AttributeValue::M(context)),
				("encrypted".to_string(), AttributeValue::L(encrypted)),
				(
					"wrapped_key".to_string(),
					AttributeValue::B(data_key.ciphertext_blob),
				),
			])),
		);
		Ok(item)
	}

	async fn decrypt_item(&self, mut item: Item) -> TesseraResult<Item> {
		let Some(envelope) = item.remove(ENVELOPE_ATTRIBUTE) else {
			if let Some(name) = item
				.keys()
				.find(|name| self.actions.action(name) == AttributeAction::Encrypt)
			{
				return Err(TesseraError::Integrity(format!(
					"attribute {name} is not covered by an envelope"
				)));
			}
			return Ok(item);
		};
		let envelope = Envelope::parse(&envelope)?;

		if envelope.context != *self.materials.context() {
			return Err(TesseraError::Integrity(format!(
				"item was encrypted under context for tenant {:?}, session is scoped to {:?}",
				envelope.context.tenant_id(),
				self.materials.context().tenant_id()
			)));
		}

		for name in item.keys() {
			if self.actions.action(name) == AttributeAction::Encrypt
				&& !envelope.encrypted.contains(name)
			{
				return Err(TesseraError::Integrity(format!(
					"attribute {name} is stored unencrypted"
				)));
			}
		}

		let key = self
			.materials
			.decryption_materials(envelope.wrapped_key)
			.await
			.map_err(|e| match e {
				TesseraError::Integrity(_)
				| TesseraError::AccessDenied { .. }
				| TesseraError::ExpiredCredentials { .. }
				| TesseraError::Transport { .. } => e,
				other => TesseraError::Integrity(format!("data key unwrap failed: {other}")),
			})?;

		for name in &envelope.encrypted {
			let Some(value) = item.get_mut(name) else {
				return Err(TesseraError::Integrity(format!(
					"encrypted attribute {name} is missing"
				)));
			};
			let Some(bytes) = value.as_b() else {
				return Err(TesseraError::Integrity(format!(
					"encrypted attribute {name} is not binary"
				)));
			};
			let sealed = Sealed::from_bytes(bytes)?;
			let plaintext = envelope::open(
				&key,
				&sealed,
				&attribute_aad(self.materials.context(), name),
			)?;
			let json: serde_json::Value = serde_json::from_slice(&plaintext)
				.map_err(|e| TesseraError::Integrity(format!("decoding {name}: {e}")))?;
			*value = AttributeValue::from_json(&json);
		}

		Ok(item)
	}
}

#[async_trait]
impl TableClient for EncryptedTable {
	async fn get_item(&self, partition_value: &str) -> TesseraResult<Option<Item>> {
		let Some(item) = self.inner.get_item(partition_value).await? else {
			return Ok(None);
		};
		match self.decrypt_item(item).await {
			Ok(item) => Ok(Some(item)),
			Err(e) => {
				if let TesseraError::Integrity(detail) = &e {
					error!(
						target: "tessera::isolation",
						partition = partition_value,
						session_tenant = ?self.materials.context().tenant_id(),
						detail = %detail,
						"stored item failed integrity check"
					);
				}
				Err(e)
			}
		}
	}

	async fn put_item(&self, item: Item) -> TesseraResult<()> {
		let item = self.encrypt_item(item).await?;
		self.inner.put_item(item).await
	}
}

/// Parsed material description.
struct Envelope<'a> {
	wrapped_key: &'a [u8],
	context: EncryptionContext,
	encrypted: BTreeSet<String>,
}

impl<'a> Envelope<'a> {
	fn parse(value: &'a AttributeValue) -> TesseraResult<Self> {
		let malformed = |what: &str| TesseraError::Integrity(format!("malformed envelope: {what}"));
		let fields = value.as_m().ok_or_else(|| malformed("not a map"))?;

		match fields.get("algorithm").and_then(AttributeValue::as_s) {
			Some(ALGORITHM) => {}
			Some(other) => return Err(malformed(&format!("unsupported algorithm {other}"))),
			None => return Err(malformed("missing algorithm")),
		}

		let wrapped_key = fields
			.get("wrapped_key")
			.and_then(AttributeValue::as_b)
			.ok_or_else(|| malformed("missing wrapped key"))?;

		let context = fields
			.get("context")
			.and_then(AttributeValue::as_m)
			.ok_or_else(|| malformed("missing context"))?
			.iter()
			.map(|(k, v)| {
				v.as_s()
					.map(|s| (k.clone(), s.to_string()))
					.ok_or_else(|| malformed("non-string context value"))
			})
			.collect::<TesseraResult<BTreeMap<_, _>>>()?;

		let encrypted = match fields.get("encrypted") {
			Some(AttributeValue::L(names)) => names
				.iter()
				.map(|n| {
					n.as_s()
						.map(str::to_string)
						.ok_or_else(|| malformed("non-string attribute name"))
				})
				.collect::<TesseraResult<BTreeSet<_>>>()?,
			_ => return Err(malformed("missing encrypted attribute list")),
		};

		Ok(Self {
			wrapped_key,
			context: EncryptionContext::from_map(context),
			encrypted,
		})
	}
}

/// Associated data for one attribute: the session context plus the
/// attribute's name, so ciphertexts cannot move between tenants or fields.
fn attribute_aad(context: &EncryptionContext, attribute: &str) -> Vec<u8> {
	let mut aad = context.canonical_bytes();
	aad.extend_from_slice(&(attribute.len() as u32).to_be_bytes());
	aad.extend_from_slice(attribute.as_bytes());
	aad
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tenant::TenantId;
	use std::sync::Mutex;

	/// Plain table over a map, no access control.
	#[derive(Default)]
	struct MapTable {
		items: Mutex<BTreeMap<String, Item>>,
	}

	#[async_trait]
	impl TableClient for MapTable {
		async fn get_item(&self, partition_value: &str) -> TesseraResult<Option<Item>> {
			Ok(self.items.lock().unwrap().get(partition_value).cloned())
		}

		async fn put_item(&self, item: Item) -> TesseraResult<()> {
			let key = item
				.get(PARTITION_ATTRIBUTE)
				.and_then(AttributeValue::as_s)
				.unwrap()
				.to_string();
			self.items.lock().unwrap().insert(key, item);
			Ok(())
		}
	}

	/// Key service that seals data keys under a fixed master key with the
	/// context as associated data.
	struct LocalKeys {
		master: Zeroizing<[u8; KEY_SIZE]>,
	}

	impl LocalKeys {
		fn new() -> Self {
			Self {
				master: envelope::generate_key(),
			}
		}
	}

	#[async_trait]
	impl KeyService for LocalKeys {
		async fn generate_data_key(&self, _key_id: &str, context: &EncryptionContext) -> TesseraResult<DataKey> {
			let plaintext = envelope::generate_key();
			let sealed = envelope::seal(&self.master, plaintext.as_slice(), &context.canonical_bytes())?;
			Ok(DataKey {
				plaintext,
				ciphertext_blob: sealed.to_bytes(),
			})
		}

		async fn decrypt(
			&self,
			_key_id: &str,
			ciphertext_blob: &[u8],
			context: &EncryptionContext,
		) -> TesseraResult<Zeroizing<Vec<u8>>> {
			envelope::open(&self.master, &Sealed::from_bytes(ciphertext_blob)?, &context.canonical_bytes())
		}
	}

	fn table_for(tenant: &str, inner: Arc<MapTable>, keys: Arc<LocalKeys>, actions: AttributeActions) -> EncryptedTable {
		let context = EncryptionContext::for_tenant(&TenantId::parse(tenant).unwrap());
		EncryptedTable::new(inner, KmsMaterialsProvider::new(keys, "key", context), actions)
	}

	fn item(tenant: &str, color: &str) -> Item {
		BTreeMap::from([
			(PARTITION_ATTRIBUTE.to_string(), AttributeValue::S(tenant.to_string())),
			("color".to_string(), AttributeValue::S(color.to_string())),
			("size".to_string(), AttributeValue::N("3".to_string())),
		])
	}

	#[tokio::test]
	async fn stores_ciphertext_and_reads_plaintext() {
		let inner = Arc::new(MapTable::default());
		let table = table_for("tenantA", inner.clone(), Arc::new(LocalKeys::new()), AttributeActions::encrypt_all());

		table.put_item(item("tenantA", "blue")).await.unwrap();

		let stored = inner.items.lock().unwrap().get("tenantA").cloned().unwrap();
		assert_eq!(stored.get(PARTITION_ATTRIBUTE), Some(&AttributeValue::S("tenantA".into())));
		assert!(stored.get("color").unwrap().as_b().is_some());
		assert!(stored.contains_key(ENVELOPE_ATTRIBUTE));

		let read = table.get_item("tenantA").await.unwrap().unwrap();
		assert_eq!(read, item("tenantA", "blue"));
	}

	#[tokio::test]
	async fn plaintext_fields_are_stored_as_is() {
		let inner = Arc::new(MapTable::default());
		let table = table_for(
			"tenantA",
			inner.clone(),
			Arc::new(LocalKeys::new()),
			AttributeActions::with_plaintext(["size"]),
		);

		table.put_item(item("tenantA", "blue")).await.unwrap();

		let stored = inner.items.lock().unwrap().get("tenantA").cloned().unwrap();
		assert_eq!(stored.get("size"), Some(&AttributeValue::N("3".into())));
		assert_eq!(table.get_item("tenantA").await.unwrap().unwrap(), item("tenantA", "blue"));
	}

	#[tokio::test]
	async fn missing_item_is_none() {
		let table = table_for(
			"tenantA",
			Arc::new(MapTable::default()),
			Arc::new(LocalKeys::new()),
			AttributeActions::encrypt_all(),
		);
		assert!(table.get_item("tenantA").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn other_tenants_item_is_integrity_error() {
		let inner = Arc::new(MapTable::default());
		let keys = Arc::new(LocalKeys::new());
		let table_b = table_for("tenantB", inner.clone(), keys.clone(), AttributeActions::encrypt_all());
		table_b.put_item(item("tenantB", "red")).await.unwrap();

		// Copy tenant B's ciphertext into tenant A's partition.
		let mut copied = inner.items.lock().unwrap().get("tenantB").cloned().unwrap();
		copied.insert(PARTITION_ATTRIBUTE.to_string(), AttributeValue::S("tenantA".into()));
		inner.items.lock().unwrap().insert("tenantA".to_string(), copied);

		let table_a = table_for("tenantA", inner, keys, AttributeActions::encrypt_all());
		let err = table_a.get_item("tenantA").await.unwrap_err();
		assert!(matches!(err, TesseraError::Integrity(_)));
	}

	#[tokio::test]
	async fn forged_envelope_context_fails_unwrap() {
		let inner = Arc::new(MapTable::default());
		let keys = Arc::new(LocalKeys::new());
		table_for("tenantB", inner.clone(), keys.clone(), AttributeActions::encrypt_all())
			.put_item(item("tenantB", "red"))
			.await
			.unwrap();

		let mut copied = inner.items.lock().unwrap().get("tenantB").cloned().unwrap();
		if let Some(AttributeValue::M(envelope)) = copied.get_mut(ENVELOPE_ATTRIBUTE) {
			envelope.insert(
				"context".to_string(),
				AttributeValue::M(BTreeMap::from([(
					"tenant_id".to_string(),
					AttributeValue::S("tenantA".into()),
				)])),
			);
		}
		inner.items.lock().unwrap().insert("tenantA".to_string(), copied);

		let table_a = table_for("tenantA", inner, keys, AttributeActions::encrypt_all());
		let err = table_a.get_item("tenantA").await.unwrap_err();
		assert!(matches!(err, TesseraError::Integrity(_)));
	}

	#[tokio::test]
	async fn tampered_ciphertext_is_integrity_error() {
		let inner = Arc::new(MapTable::default());
		let table = table_for("tenantA", inner.clone(), Arc::new(LocalKeys::new()), AttributeActions::encrypt_all());
		table.put_item(item("tenantA", "blue")).await.unwrap();

		if let Some(AttributeValue::B(bytes)) = inner
			.items
			.lock()
			.unwrap()
			.get_mut("tenantA")
			.and_then(|item| item.get_mut("color"))
		{
			let last = bytes.len() - 1;
			bytes[last] ^= 0x01;
		}

		let err = table.get_item("tenantA").await.unwrap_err();
		assert!(matches!(err, TesseraError::Integrity(_)));
	}

	#[tokio::test]
	async fn stripped_envelope_is_integrity_error() {
		let inner = Arc::new(MapTable::default());
		let table = table_for("tenantA", inner.clone(), Arc::new(LocalKeys::new()), AttributeActions::encrypt_all());
		table.put_item(item("tenantA", "blue")).await.unwrap();

		inner
			.items
			.lock()
			.unwrap()
			.get_mut("tenantA")
			.unwrap()
			.remove(ENVELOPE_ATTRIBUTE);

		let err = table.get_item("tenantA").await.unwrap_err();
		assert!(matches!(err, TesseraError::Integrity(_)));
	}

	#[tokio::test]
	async fn injected_plaintext_attribute_is_integrity_error() {
		let inner = Arc::new(MapTable::default());
		let table = table_for("tenantA", inner.clone(), Arc::new(LocalKeys::new()), AttributeActions::encrypt_all());
		table.put_item(item("tenantA", "blue")).await.unwrap();

		inner
			.items
			.lock()
			.unwrap()
			.get_mut("tenantA")
			.unwrap()
			.insert("admin".to_string(), AttributeValue::Bool(true));

		let err = table.get_item("tenantA").await.unwrap_err();
		assert!(matches!(err, TesseraError::Integrity(_)));
	}

	#[tokio::test]
	async fn reserved_attribute_is_rejected_on_write() {
		let table = table_for(
			"tenantA",
			Arc::new(MapTable::default()),
			Arc::new(LocalKeys::new()),
			AttributeActions::encrypt_all(),
		);
		let mut forged = item("tenantA", "blue");
		forged.insert(ENVELOPE_ATTRIBUTE.to_string(), AttributeValue::Null);
		let err = table.put_item(forged).await.unwrap_err();
		assert!(matches!(err, TesseraError::BadRequest(_)));
	}

	#[test]
	fn partition_attribute_is_never_encrypted() {
		let actions = AttributeActions::encrypt_all();
		assert_eq!(actions.action(PARTITION_ATTRIBUTE), AttributeAction::Plaintext);
		assert_eq!(actions.action("color"), AttributeAction::Encrypt);
	}
}
