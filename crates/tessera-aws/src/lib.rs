// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! AWS collaborators for tenant-scoped access.
//!
//! - [`StsTrustBroker`]: `AssumeRole` with the `TenantID` session tag
//! - [`AwsClientFactory`]: per-request DynamoDB and KMS clients signed with
//!   the scoped credentials
//!
//! Region, retries and the HTTP client come from one shared SDK config
//! loaded at startup.

mod dynamodb;
mod error;
mod factory;
mod kms;
mod sts;

pub use dynamodb::DynamoTable;
pub use factory::AwsClientFactory;
pub use kms::KmsKeyService;
pub use sts::StsTrustBroker;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_sts::config::Region;

/// Load the shared SDK config from the environment, optionally pinning the
/// region.
pub async fn load_shared_config(region: Option<&str>) -> SdkConfig {
	let mut loader = aws_config::defaults(BehaviorVersion::latest());
	if let Some(region) = region {
		loader = loader.region(Region::new(region.to_string()));
	}
	loader.load().await
}
