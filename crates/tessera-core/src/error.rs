// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for tenant-scoped operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

/// Errors surfaced by the broker, the record store and their collaborators.
///
/// Every variant is local to a single request. None of them are retried
/// internally: bad input, policy misconfiguration and expired scope are not
/// fixed by trying again.
#[derive(Error, Debug)]
pub enum TesseraError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("bad request: {0}")]
	BadRequest(String),

	#[error("access denied during {operation}: {message}")]
	AccessDenied {
		operation: &'static str,
		message: String,
	},

	#[error("configuration error during {operation}: {message}")]
	Configuration {
		operation: &'static str,
		message: String,
	},

	#[error("credentials expired during {operation}")]
	ExpiredCredentials { operation: &'static str },

	#[error("integrity check failed: {0}")]
	Integrity(String),

	#[error("{operation} failed: {message}")]
	Transport {
		operation: &'static str,
		message: String,
	},
}

impl TesseraError {
	pub fn access_denied(operation: &'static str, message: impl Into<String>) -> Self {
		Self::AccessDenied {
			operation,
			message: message.into(),
		}
	}

	pub fn configuration(operation: &'static str, message: impl Into<String>) -> Self {
		Self::Configuration {
			operation,
			message: message.into(),
		}
	}

	pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
		Self::Transport {
			operation,
			message: message.into(),
		}
	}

	/// HTTP status code equivalent for the inbound caller.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::InvalidArgument(_) | Self::BadRequest(_) => 400,
			Self::ExpiredCredentials { .. } => 401,
			Self::AccessDenied { .. } => 403,
			Self::Configuration { .. } | Self::Integrity(_) => 500,
			Self::Transport { .. } => 502,
		}
	}

	/// Stable machine-readable code for API responses.
	pub fn error_code(&self) -> &'static str {
		match self {
			Self::InvalidArgument(_) => "invalid_argument",
			Self::BadRequest(_) => "bad_request",
			Self::AccessDenied { .. } => "access_denied",
			Self::Configuration { .. } => "configuration_error",
			Self::ExpiredCredentials { .. } => "expired_credentials",
			Self::Integrity(_) => "integrity_error",
			Self::Transport { .. } => "upstream_error",
		}
	}

	/// True for failures the inbound caller cannot fix by changing the request.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			Self::Configuration { .. } | Self::Integrity(_) | Self::Transport { .. }
		)
	}
}
