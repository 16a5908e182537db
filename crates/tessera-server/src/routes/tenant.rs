// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant record HTTP handlers.
//!
//! The path's tenant identifier is trusted as supplied. Each request mints
//! its own scoped credentials; nothing is reused across requests.

use axum::{
	body::Bytes,
	extract::{Path, State},
	Json,
};
use tessera_core::{parse_tenant_data, TenantRecord, TenantRecordStore};
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /tenant/{tenant_id} - Read the tenant's record, `{}` when absent.
#[instrument(skip(state))]
pub async fn get_tenant(
	State(state): State<AppState>,
	Path(tenant_id): Path<String>,
) -> Result<Json<TenantRecord>, ApiError> {
	let context = state.broker.open_session(&tenant_id).await?;
	let store = TenantRecordStore::new(&context, state.factory.as_ref(), &state.settings);
	Ok(Json(store.retrieve().await?))
}

/// PUT|POST /tenant/{tenant_id} - Upsert the tenant's record from a JSON
/// object body and return it as written.
#[instrument(skip(state, body), fields(body_len = body.len()))]
pub async fn put_tenant(
	State(state): State<AppState>,
	Path(tenant_id): Path<String>,
	body: Bytes,
) -> Result<Json<TenantRecord>, ApiError> {
	let data = parse_tenant_data(&body)?;
	let context = state.broker.open_session(&tenant_id).await?;
	let store = TenantRecordStore::new(&context, state.factory.as_ref(), &state.settings);
	Ok(Json(store.store(data).await?))
}
