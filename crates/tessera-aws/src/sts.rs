// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! STS-backed trust broker.

use async_trait::async_trait;
use aws_sdk_sts::types::Tag;
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use tessera_common_secret::SecretString;
use tessera_core::{AssumeRoleRequest, TemporaryCredentials, TesseraError, TesseraResult, TrustBroker};
use tracing::{debug, instrument};

use crate::error::classify;

const OPERATION: &str = "sts:AssumeRole";

/// Process-wide STS client, built once and shared by every request.
#[derive(Clone)]
pub struct StsTrustBroker {
	client: StsClient,
}

impl StsTrustBroker {
	pub fn new(client: StsClient) -> Self {
		Self { client }
	}

	pub fn from_shared(shared: &aws_config::SdkConfig, endpoint: Option<&str>) -> Self {
		let mut builder = aws_sdk_sts::config::Builder::from(shared);
		if let Some(endpoint) = endpoint {
			builder = builder.endpoint_url(endpoint);
		}
		Self::new(StsClient::from_conf(builder.build()))
	}
}

#[async_trait]
impl TrustBroker for StsTrustBroker {
	#[instrument(skip(self, request), fields(role_arn = %request.role_arn, session_name = %request.session_name))]
	async fn assume_role(&self, request: AssumeRoleRequest) -> TesseraResult<TemporaryCredentials> {
		let duration = i32::try_from(request.duration.as_secs()).map_err(|_| {
			TesseraError::configuration(OPERATION, "session duration out of range")
		})?;

		let tags = request
			.tags
			.iter()
			.map(|tag| {
				Tag::builder()
					.key(&tag.key)
					.value(&tag.value)
					.build()
					.map_err(|e| TesseraError::configuration(OPERATION, e.to_string()))
			})
			.collect::<TesseraResult<Vec<_>>>()?;

		let output = self
			.client
			.assume_role()
			.role_arn(&request.role_arn)
			.role_session_name(&request.session_name)
			.duration_seconds(duration)
			.set_tags(Some(tags))
			.send()
			.await
			.map_err(|e| classify(OPERATION, e, None))?;

		let credentials = output.credentials().ok_or_else(|| {
			TesseraError::transport(OPERATION, "response carried no credentials")
		})?;
		debug!(access_key_id = credentials.access_key_id(), "assumed role");

		Ok(TemporaryCredentials {
			access_key_id: credentials.access_key_id().to_string(),
			secret_access_key: SecretString::new(credentials.secret_access_key().to_string()),
			session_token: SecretString::new(credentials.session_token().to_string()),
			expiration: to_utc(credentials.expiration())?,
		})
	}
}

fn to_utc(value: &aws_smithy_types::DateTime) -> TesseraResult<DateTime<Utc>> {
	DateTime::from_timestamp(value.secs(), value.subsec_nanos()).ok_or_else(|| {
		TesseraError::transport(OPERATION, format!("credential expiration {value} is out of range"))
	})
}
