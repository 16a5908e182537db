// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Collaborator seams: table clients, key services and the factory that
//! builds both from a scoped access context.

use std::sync::Arc;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::credentials::ScopedAccessContext;
use crate::crypto::envelope::KEY_SIZE;
use crate::error::TesseraResult;
use crate::item::Item;
use crate::tenant::EncryptionContext;

/// Point-get / point-put capability on the shared table.
///
/// Implemented by the plain SDK-backed client and by
/// [`EncryptedTable`](crate::EncryptedTable), so the record store does not
/// know whether encryption is enabled.
#[async_trait]
pub trait TableClient: Send + Sync {
	/// Strongly consistent read of the item with the given partition value.
	async fn get_item(&self, partition_value: &str) -> TesseraResult<Option<Item>>;

	/// Unconditional create-or-replace.
	async fn put_item(&self, item: Item) -> TesseraResult<()>;
}

#[async_trait]
impl<T: TableClient + ?Sized> TableClient for Arc<T> {
	async fn get_item(&self, partition_value: &str) -> TesseraResult<Option<Item>> {
		(**self).get_item(partition_value).await
	}

	async fn put_item(&self, item: Item) -> TesseraResult<()> {
		(**self).put_item(item).await
	}
}

/// A freshly generated data key: plaintext for local use, wrapped for storage.
pub struct DataKey {
	pub plaintext: Zeroizing<[u8; KEY_SIZE]>,
	pub ciphertext_blob: Vec<u8>,
}

/// generate-data-key / decrypt on the shared key, always under a context.
#[async_trait]
pub trait KeyService: Send + Sync {
	async fn generate_data_key(
		&self,
		key_id: &str,
		context: &EncryptionContext,
	) -> TesseraResult<DataKey>;

	async fn decrypt(
		&self,
		key_id: &str,
		ciphertext_blob: &[u8],
		context: &EncryptionContext,
	) -> TesseraResult<Zeroizing<Vec<u8>>>;
}

/// Builds collaborator clients that authenticate with a context's credentials.
pub trait ScopedClientFactory: Send + Sync {
	fn table(&self, context: &ScopedAccessContext, table_name: &str) -> Arc<dyn TableClient>;

	fn keys(&self, context: &ScopedAccessContext) -> Arc<dyn KeyService>;
}
