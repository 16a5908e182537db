// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tessera_config::{LogFormat, LoggingConfig, ServiceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);

	match logging.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json().with_current_span(true))
			.init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

/// Summarise the resolved configuration. Configuration is loaded before the
/// subscriber exists, so this runs once tracing is installed.
pub fn log_config_summary(config: &ServiceConfig) {
	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		backend = %config.backend.kind,
		role_arn = %config.aws.role_arn,
		table = %config.aws.table_name,
		encryption_enabled = config.encryption.enabled,
		plaintext_fields = config.encryption.plaintext_fields.len(),
		"Service configuration loaded"
	);
}
