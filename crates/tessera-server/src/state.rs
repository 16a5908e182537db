// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide state shared by the routes, and its construction from config.

use std::sync::Arc;

use tessera_config::{BackendKind, EncryptionConfig, ServiceConfig};
use tessera_core::{
	AttributeActions, CredentialBroker, InMemoryCloud, MemoryResources, ScopedClientFactory,
	StoreSettings,
};

/// Injected collaborators. Nothing tenant-specific is held here.
#[derive(Clone)]
pub struct AppState {
	pub broker: CredentialBroker,
	pub factory: Arc<dyn ScopedClientFactory>,
	pub settings: Arc<StoreSettings>,
	pub backend: BackendKind,
}

impl AppState {
	pub fn new(
		broker: CredentialBroker,
		factory: Arc<dyn ScopedClientFactory>,
		settings: StoreSettings,
		backend: BackendKind,
	) -> Self {
		Self {
			broker,
			factory,
			settings: Arc::new(settings),
			backend,
		}
	}

	/// State over an in-memory cloud.
	pub fn memory(cloud: InMemoryCloud, encryption: &EncryptionConfig) -> Self {
		let resources = cloud.resources().clone();
		let broker = CredentialBroker::new(Arc::new(cloud.clone()), resources.role_arn.clone());
		let settings = StoreSettings {
			table_name: resources.table_name,
			key_id: resources.key_arn,
			encryption: attribute_actions(encryption),
		};
		Self::new(broker, Arc::new(cloud), settings, BackendKind::Memory)
	}
}

/// `None` when encryption is disabled.
pub fn attribute_actions(encryption: &EncryptionConfig) -> Option<AttributeActions> {
	encryption
		.enabled
		.then(|| AttributeActions::with_plaintext(encryption.plaintext_fields.iter().cloned()))
}

/// Build the state for the configured backend.
pub async fn build_state(config: &ServiceConfig) -> AppState {
	match config.backend.kind {
		BackendKind::Memory => {
			let cloud = InMemoryCloud::new(MemoryResources {
				role_arn: config.aws.role_arn.clone(),
				table_name: config.aws.table_name.clone(),
				key_arn: config.aws.key_id.clone(),
				..MemoryResources::default()
			});
			AppState::memory(cloud, &config.encryption)
		}
		BackendKind::Aws => {
			let shared = tessera_aws::load_shared_config(config.aws.region.as_deref()).await;
			let trust = tessera_aws::StsTrustBroker::from_shared(&shared, config.aws.sts_endpoint.as_deref());
			let factory = tessera_aws::AwsClientFactory::new(
				shared,
				config.aws.dynamodb_endpoint.clone(),
				config.aws.kms_endpoint.clone(),
			);
			let settings = StoreSettings {
				table_name: config.aws.table_name.clone(),
				key_id: config.aws.key_id.clone(),
				encryption: attribute_actions(&config.encryption),
			};
			AppState::new(
				CredentialBroker::new(Arc::new(trust), config.aws.role_arn.clone()),
				Arc::new(factory),
				settings,
				BackendKind::Aws,
			)
		}
	}
}
