// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collaborator backend selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which collaborators the service talks to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
	/// STS, DynamoDB and KMS.
	#[default]
	Aws,
	/// In-process simulation for local runs.
	Memory,
}

impl fmt::Display for BackendKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BackendKind::Aws => write!(f, "aws"),
			BackendKind::Memory => write!(f, "memory"),
		}
	}
}

impl FromStr for BackendKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"aws" => Ok(BackendKind::Aws),
			"memory" => Ok(BackendKind::Memory),
			other => Err(format!("unknown backend '{other}', expected 'aws' or 'memory'")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BackendConfigLayer {
	pub kind: Option<BackendKind>,
}

impl BackendConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.kind.is_some() {
			self.kind = other.kind;
		}
	}

	pub fn finalize(self) -> BackendConfig {
		BackendConfig {
			kind: self.kind.unwrap_or_default(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendConfig {
	pub kind: BackendKind,
}
