// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! KMS key service. Every call carries the session's encryption context.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::DataKeySpec;
use aws_sdk_kms::Client as KmsClient;
use chrono::{DateTime, Utc};
use tessera_core::crypto::envelope;
use tessera_core::{DataKey, EncryptionContext, KeyService, TesseraError, TesseraResult};
use zeroize::Zeroizing;

use crate::error::classify;

pub struct KmsKeyService {
	client: KmsClient,
	expiration: DateTime<Utc>,
}

impl KmsKeyService {
	pub fn new(client: KmsClient, expiration: DateTime<Utc>) -> Self {
		Self { client, expiration }
	}
}

fn context_map(context: &EncryptionContext) -> HashMap<String, String> {
	context
		.iter()
		.map(|(k, v)| (k.clone(), v.clone()))
		.collect()
}

#[async_trait]
impl KeyService for KmsKeyService {
	async fn generate_data_key(&self, key_id: &str, context: &EncryptionContext) -> TesseraResult<DataKey> {
		const OPERATION: &str = "kms:GenerateDataKey";
		let output = self
			.client
			.generate_data_key()
			.key_id(key_id)
			.key_spec(DataKeySpec::Aes256)
			.set_encryption_context(Some(context_map(context)))
			.send()
			.await
			.map_err(|e| classify(OPERATION, e, Some(self.expiration)))?;

		let plaintext = output
			.plaintext()
			.ok_or_else(|| TesseraError::transport(OPERATION, "response carried no plaintext key"))?;
		let ciphertext_blob = output
			.ciphertext_blob()
			.ok_or_else(|| TesseraError::transport(OPERATION, "response carried no wrapped key"))?;

		Ok(DataKey {
			plaintext: envelope::key_from_slice(plaintext.as_ref())?,
			ciphertext_blob: ciphertext_blob.as_ref().to_vec(),
		})
	}

	async fn decrypt(
		&self,
		key_id: &str,
		ciphertext_blob: &[u8],
		context: &EncryptionContext,
	) -> TesseraResult<Zeroizing<Vec<u8>>> {
		const OPERATION: &str = "kms:Decrypt";
		let output = self
			.client
			.decrypt()
			.key_id(key_id)
			.ciphertext_blob(Blob::new(ciphertext_blob))
			.set_encryption_context(Some(context_map(context)))
			.send()
			.await
			.map_err(|e| classify(OPERATION, e, Some(self.expiration)))?;

		output
			.plaintext()
			.map(|blob| Zeroizing::new(blob.as_ref().to_vec()))
			.ok_or_else(|| TesseraError::transport(OPERATION, "response carried no plaintext"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tessera_core::TenantId;

	#[test]
	fn context_map_carries_tenant() {
		let context = EncryptionContext::for_tenant(&TenantId::parse("tenantA").unwrap());
		let map = context_map(&context);
		assert_eq!(map.len(), 1);
		assert_eq!(map.get("tenant_id").map(String::as_str), Some("tenantA"));
	}
}
