// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tenant-scoped record service binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tessera_server::policy::{self, PolicyTargets};
use tessera_server::{build_state, create_router, telemetry};
use tower_http::trace::TraceLayer;

mod version;

/// Tessera - tenant-isolated records on a shared table and key.
#[derive(Parser, Debug)]
#[command(name = "tessera-server", about = "Tenant-scoped record service", version)]
struct Args {
	/// Config file (defaults to /etc/tessera/service.toml)
	#[arg(long, env = "TESSERA_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the HTTP server (default)
	Serve,
	/// Print the role's permission and trust policies as JSON
	Policy {
		/// Principal allowed to assume the role (defaults to the account root)
		#[arg(long)]
		principal: Option<String>,
	},
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => tessera_config::load_config_with_file(path)?,
		None => tessera_config::load_config()?,
	};

	if let Some(Command::Policy { principal }) = args.command {
		let targets = PolicyTargets::from_config(&config.aws, principal)?;
		let rendered = policy::render(&config.aws, &targets)?;
		println!("{}", serde_json::to_string_pretty(&rendered)?);
		return Ok(());
	}

	telemetry::init_tracing(&config.logging);

	telemetry::log_config_summary(&config);
	tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting tessera-server");

	let state = build_state(&config).await;
	let app = create_router(state).layer(TraceLayer::new_for_http());

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}
