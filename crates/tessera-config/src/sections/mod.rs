// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod aws;
mod backend;
mod encryption;
mod http;
mod logging;

pub use aws::{AwsConfig, AwsConfigLayer, MEMORY_KEY_ID, MEMORY_ROLE_ARN, MEMORY_TABLE_NAME};
pub use backend::{BackendConfig, BackendConfigLayer, BackendKind};
pub use encryption::{EncryptionConfig, EncryptionConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer, DEFAULT_HOST, DEFAULT_PORT};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
