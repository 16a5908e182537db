// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Mapping of SDK failures onto the tenant-scoped error taxonomy.

use std::fmt::Debug;

use aws_sdk_sts::error::{DisplayErrorContext, SdkError};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use chrono::{DateTime, Utc};
use tessera_core::TesseraError;

/// Classify an SDK error for `operation`.
///
/// Service errors are mapped by their error code. Anything else (timeouts,
/// dispatch failures, unreadable responses) is a transport error, unless the
/// credentials had already expired, in which case the SDK refused to sign.
pub(crate) fn classify<E, R>(
	operation: &'static str,
	err: SdkError<E, R>,
	expiration: Option<DateTime<Utc>>,
) -> TesseraError
where
	E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
	R: Debug,
{
	if let SdkError::ServiceError(context) = &err {
		let code = context.err().code().unwrap_or("Unknown");
		let message = context.err().message().unwrap_or(code).to_string();
		return from_code(operation, code, message);
	}

	if expiration.is_some_and(|expiration| Utc::now() >= expiration) {
		return TesseraError::ExpiredCredentials { operation };
	}
	TesseraError::transport(operation, DisplayErrorContext(&err).to_string())
}

/// Map an AWS error code onto the taxonomy.
pub(crate) fn from_code(operation: &'static str, code: &str, message: String) -> TesseraError {
	match code {
		"ExpiredToken" | "ExpiredTokenException" | "RequestExpired" => {
			TesseraError::ExpiredCredentials { operation }
		}
		"AccessDenied"
		| "AccessDeniedException"
		| "UnrecognizedClientException"
		| "InvalidClientTokenId"
		| "InvalidSignatureException"
		| "SignatureDoesNotMatch"
		| "NotAuthorized" => TesseraError::access_denied(operation, format!("{code}: {message}")),
		"InvalidCiphertextException" | "IncorrectKeyException" => {
			TesseraError::Integrity(format!("{operation}: {code}: {message}"))
		}
		"ResourceNotFoundException"
		| "NotFoundException"
		| "NoSuchEntity"
		| "MalformedPolicyDocument"
		| "PackedPolicyTooLarge"
		| "RegionDisabledException"
		| "DisabledException"
		| "KMSInvalidStateException"
		| "InvalidKeyUsageException"
		| "ValidationError"
		| "ValidationException" => TesseraError::configuration(operation, format!("{code}: {message}")),
		_ => TesseraError::transport(operation, format!("{code}: {message}")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expired_token_codes() {
		for code in ["ExpiredToken", "ExpiredTokenException", "RequestExpired"] {
			assert!(matches!(
				from_code("dynamodb:GetItem", code, "expired".into()),
				TesseraError::ExpiredCredentials {
					operation: "dynamodb:GetItem"
				}
			));
		}
	}

	#[test]
	fn access_denied_codes() {
		let err = from_code(
			"sts:AssumeRole",
			"AccessDenied",
			"not authorized to perform: sts:TagSession".into(),
		);
		assert!(matches!(err, TesseraError::AccessDenied { .. }));
		assert!(err.to_string().contains("sts:TagSession"));
	}

	#[test]
	fn invalid_ciphertext_is_integrity() {
		let err = from_code("kms:Decrypt", "InvalidCiphertextException", String::new());
		assert!(matches!(err, TesseraError::Integrity(_)));
	}

	#[test]
	fn missing_resources_are_configuration() {
		for code in ["ResourceNotFoundException", "NotFoundException", "ValidationError"] {
			assert!(matches!(
				from_code("op", code, String::new()),
				TesseraError::Configuration { .. }
			));
		}
	}

	fn timeout() -> SdkError<aws_sdk_sts::operation::assume_role::AssumeRoleError, ()> {
		SdkError::timeout_error("request timed out")
	}

	#[test]
	fn unsigned_failure_after_expiry_is_expired_credentials() {
		let expired = Utc::now() - chrono::Duration::seconds(1);
		let err = classify("dynamodb:GetItem", timeout(), Some(expired));
		assert!(matches!(
			err,
			TesseraError::ExpiredCredentials {
				operation: "dynamodb:GetItem"
			}
		));
	}

	#[test]
	fn unsigned_failure_before_expiry_is_transport() {
		let live = Utc::now() + chrono::Duration::seconds(900);
		for expiration in [Some(live), None] {
			let err = classify("dynamodb:GetItem", timeout(), expiration);
			assert!(matches!(err, TesseraError::Transport { .. }));
		}
	}

	#[test]
	fn unknown_codes_are_transport() {
		let err = from_code("dynamodb:PutItem", "ProvisionedThroughputExceededException", "slow down".into());
		assert!(matches!(err, TesseraError::Transport { .. }));
		assert_eq!(err.status_code(), 502);
	}
}
