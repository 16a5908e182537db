// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::SystemTime;

use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use tessera_core::{KeyService, ScopedAccessContext, ScopedClientFactory, TableClient};

use crate::dynamodb::DynamoTable;
use crate::kms::KmsKeyService;

const PROVIDER_NAME: &str = "tessera-tenant-scope";

/// Builds DynamoDB and KMS clients that sign with a context's credentials.
///
/// The shared config supplies region, retry and HTTP settings; only the
/// credentials differ per request.
#[derive(Clone)]
pub struct AwsClientFactory {
	shared: SdkConfig,
	dynamodb_endpoint: Option<String>,
	kms_endpoint: Option<String>,
}

impl AwsClientFactory {
	pub fn new(shared: SdkConfig, dynamodb_endpoint: Option<String>, kms_endpoint: Option<String>) -> Self {
		Self {
			shared,
			dynamodb_endpoint,
			kms_endpoint,
		}
	}
}

fn scoped_credentials(context: &ScopedAccessContext) -> Credentials {
	let credentials = context.credentials();
	Credentials::new(
		credentials.access_key_id.clone(),
		credentials.secret_access_key.expose().clone(),
		Some(credentials.session_token.expose().clone()),
		Some(SystemTime::from(credentials.expiration)),
		PROVIDER_NAME,
	)
}

impl ScopedClientFactory for AwsClientFactory {
	fn table(&self, context: &ScopedAccessContext, table_name: &str) -> Arc<dyn TableClient> {
		let mut builder =
			aws_sdk_dynamodb::config::Builder::from(&self.shared).credentials_provider(scoped_credentials(context));
		if let Some(endpoint) = self.dynamodb_endpoint.as_deref() {
			builder = builder.endpoint_url(endpoint);
		}
		Arc::new(DynamoTable::new(
			aws_sdk_dynamodb::Client::from_conf(builder.build()),
			table_name,
			context.expiration(),
		))
	}

	fn keys(&self, context: &ScopedAccessContext) -> Arc<dyn KeyService> {
		let mut builder =
			aws_sdk_kms::config::Builder::from(&self.shared).credentials_provider(scoped_credentials(context));
		if let Some(endpoint) = self.kms_endpoint.as_deref() {
			builder = builder.endpoint_url(endpoint);
		}
		Arc::new(KmsKeyService::new(
			aws_sdk_kms::Client::from_conf(builder.build()),
			context.expiration(),
		))
	}
}
