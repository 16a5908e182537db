// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP surface for tenant-scoped record access.

pub mod error;
pub mod policy;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use error::{ApiError, ErrorResponse};
pub use state::{build_state, AppState};

use axum::{routing::get, Router};

/// Build the router. Middleware layers are added by the binary.
pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(routes::health::health_check))
		.route(
			"/tenant/{tenant_id}",
			get(routes::tenant::get_tenant)
				.put(routes::tenant::put_tenant)
				.post(routes::tenant::put_tenant),
		)
		.with_state(state)
}
