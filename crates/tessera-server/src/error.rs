// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tessera_core::TesseraError;

/// Error body returned by every route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

/// Route-level error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
	#[error(transparent)]
	Tessera(#[from] TesseraError),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let ApiError::Tessera(e) = self;
		let status =
			StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		// Internal failures are logged in full but only summarised to the caller.
		let message = if e.is_internal() {
			tracing::error!(error = %e, code = e.error_code(), "request failed");
			match &e {
				TesseraError::Integrity(_) => "stored record failed verification".to_string(),
				TesseraError::Transport { operation, .. } => format!("{operation} failed"),
				_ => "service misconfigured".to_string(),
			}
		} else {
			tracing::debug!(error = %e, code = e.error_code(), "request rejected");
			e.to_string()
		};

		(
			status,
			Json(ErrorResponse {
				error: e.error_code().to_string(),
				message,
			}),
		)
			.into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_follows_error_kind() {
		let cases = [
			(TesseraError::InvalidArgument("empty".into()), StatusCode::BAD_REQUEST),
			(TesseraError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
			(
				TesseraError::ExpiredCredentials {
					operation: "dynamodb:GetItem",
				},
				StatusCode::UNAUTHORIZED,
			),
			(
				TesseraError::access_denied("dynamodb:GetItem", "denied"),
				StatusCode::FORBIDDEN,
			),
			(TesseraError::Integrity("tampered".into()), StatusCode::INTERNAL_SERVER_ERROR),
			(
				TesseraError::transport("kms:Decrypt", "timeout"),
				StatusCode::BAD_GATEWAY,
			),
		];
		for (error, status) in cases {
			assert_eq!(ApiError::from(error).into_response().status(), status);
		}
	}
}
