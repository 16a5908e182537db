// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tenant Record Store: one tenant's item in the shared table.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::credentials::ScopedAccessContext;
use crate::encrypted_table::{AttributeActions, EncryptedTable, KmsMaterialsProvider};
use crate::error::TesseraResult;
use crate::item::{item_from_record, record_from_item};
use crate::table::{ScopedClientFactory, TableClient};
use crate::tenant::{TenantData, TenantId, TenantRecord};

/// Process-level settings every store is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
	pub table_name: String,
	pub key_id: String,
	/// `None` talks to the table in plaintext.
	pub encryption: Option<AttributeActions>,
}

/// Reads and writes exactly one tenant's record.
///
/// Built per request from a [`ScopedAccessContext`]; the tenant it serves is
/// the context's tenant and cannot be chosen by the caller.
pub struct TenantRecordStore {
	tenant_id: TenantId,
	table: Arc<dyn TableClient>,
}

impl TenantRecordStore {
	/// Build the store's table client from the context's credentials.
	///
	/// With encryption enabled this also sets up the key materials provider
	/// for the context's encryption context, once for the store's lifetime.
	pub fn new(
		context: &ScopedAccessContext,
		factory: &dyn ScopedClientFactory,
		settings: &StoreSettings,
	) -> Self {
		let plain = factory.table(context, &settings.table_name);
		let table: Arc<dyn TableClient> = match &settings.encryption {
			Some(actions) => {
				let materials = KmsMaterialsProvider::new(
					factory.keys(context),
					settings.key_id.clone(),
					context.encryption_context().clone(),
				);
				Arc::new(EncryptedTable::new(plain, materials, actions.clone()))
			}
			None => plain,
		};

		Self {
			tenant_id: context.tenant_id().clone(),
			table,
		}
	}

	/// Build a store over an already-constructed table client.
	pub fn with_table(tenant_id: TenantId, table: Arc<dyn TableClient>) -> Self {
		Self { tenant_id, table }
	}

	pub fn tenant_id(&self) -> &TenantId {
		&self.tenant_id
	}

	/// Point-read of the tenant's record. An absent record is empty, not an
	/// error.
	#[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
	pub async fn retrieve(&self) -> TesseraResult<TenantRecord> {
		match self.table.get_item(self.tenant_id.as_str()).await? {
			Some(item) => record_from_item(&item),
			None => {
				debug!("no record stored for tenant");
				Ok(TenantRecord::empty())
			}
		}
	}

	/// Upsert the tenant's record and return it as written, before
	/// encryption. Any partition attribute in `data` is replaced with the
	/// bound tenant id.
	#[instrument(skip(self, data), fields(tenant_id = %self.tenant_id, fields = data.len()))]
	pub async fn store(&self, data: TenantData) -> TesseraResult<TenantRecord> {
		let record = TenantRecord::for_tenant(&self.tenant_id, data);
		self.table.put_item(item_from_record(&record)).await?;
		Ok(record)
	}
}
