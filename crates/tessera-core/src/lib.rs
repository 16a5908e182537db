// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tenant isolation on a shared table and a shared key.
//!
//! A request's tenant identifier is turned into temporary credentials that
//! carry a `TenantID` session tag ([`CredentialBroker`]). Those credentials
//! are wrapped in a [`ScopedAccessContext`], from which a
//! [`TenantRecordStore`] performs one encrypted point-get or point-put. The
//! permission policies in [`policy`] make the tag the only thing that decides
//! which partition and which encryption context the credentials can reach.

pub mod broker;
pub mod credentials;
pub mod crypto;
pub mod encrypted_table;
pub mod error;
pub mod item;
pub mod memory;
pub mod policy;
pub mod store;
pub mod table;
pub mod tenant;

pub use broker::{session_name, AssumeRoleRequest, CredentialBroker, TrustBroker, SESSION_DURATION};
pub use credentials::{ScopedAccessContext, ScopedCredentialSet, TemporaryCredentials};
pub use encrypted_table::{AttributeAction, AttributeActions, EncryptedTable, KmsMaterialsProvider, ENVELOPE_ATTRIBUTE};
pub use error::{TesseraError, TesseraResult};
pub use item::{AttributeValue, Item};
pub use memory::{InMemoryCloud, MemoryResources};
pub use store::{StoreSettings, TenantRecordStore};
pub use table::{DataKey, KeyService, ScopedClientFactory, TableClient};
pub use tenant::{
	parse_tenant_data, EncryptionContext, SessionTag, TenantData, TenantId, TenantRecord,
	ENCRYPTION_CONTEXT_KEY, PARTITION_ATTRIBUTE, TENANT_TAG_KEY,
};
