// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory stand-ins for the trust broker, the table and the key service.
//!
//! [`InMemoryCloud`] keeps sessions, items and a master key in process and
//! evaluates the rendered Policy Model documents on every call, so tenant
//! isolation is enforced by policy evaluation exactly as it is against the
//! real platform. Used by tests and by the `memory` backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use tessera_common_secret::SecretString;
use tracing::debug;
use zeroize::Zeroizing;

use crate::broker::{AssumeRoleRequest, TrustBroker};
use crate::credentials::{ScopedAccessContext, TemporaryCredentials};
use crate::crypto::envelope::{self, Sealed, KEY_SIZE};
use crate::error::{TesseraError, TesseraResult};
use crate::item::{AttributeValue, Item};
use crate::policy::{
	evaluate, request_tag_key, resource_access_policy, trust_policy, PolicyDocument,
	RequestContext, LEADING_KEYS_CONDITION,
};
use crate::table::{DataKey, KeyService, ScopedClientFactory, TableClient};
use crate::tenant::{EncryptionContext, PARTITION_ATTRIBUTE};

const ACCOUNT: &str = "000000000000";
const REGION: &str = "us-east-1";

/// Longest session STS grants a role by default.
const MAX_SESSION_SECONDS: u64 = 3600;

/// Identifiers of the simulated resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryResources {
	pub role_arn: String,
	pub table_name: String,
	pub key_arn: String,
	/// Identity the broker calls STS as.
	pub caller_arn: String,
	/// Principal the role's trust policy admits.
	pub trusted_principal_arn: String,
}

impl Default for MemoryResources {
	fn default() -> Self {
		let broker = format!("arn:aws:iam::{ACCOUNT}:role/TesseraBroker");
		Self {
			role_arn: format!("arn:aws:iam::{ACCOUNT}:role/TesseraResourceAccess"),
			table_name: "tessera-tenants".to_string(),
			key_arn: format!(
				"arn:aws:kms:{REGION}:{ACCOUNT}:key/00000000-0000-0000-0000-000000000000"
			),
			caller_arn: broker.clone(),
			trusted_principal_arn: broker,
		}
	}
}

impl MemoryResources {
	pub fn table_arn(&self) -> String {
		format!("arn:aws:dynamodb:{REGION}:{ACCOUNT}:table/{}", self.table_name)
	}
}

struct Session {
	session_token: String,
	tags: BTreeMap<String, String>,
	expiration: DateTime<Utc>,
}

struct CloudState {
	resources: MemoryResources,
	resource_policy: PolicyDocument,
	trust_policy: PolicyDocument,
	master_key: Zeroizing<[u8; KEY_SIZE]>,
	sessions: Mutex<HashMap<String, Session>>,
	items: Mutex<HashMap<String, Item>>,
	clock_offset: Mutex<chrono::Duration>,
	broker_calls: AtomicUsize,
	next_key: AtomicU64,
}

impl CloudState {
	fn now(&self) -> DateTime<Utc> {
		Utc::now() + *lock(&self.clock_offset)
	}

	/// Resolve the caller's session and return its tags.
	fn authenticate(
		&self,
		operation: &'static str,
		access_key_id: &str,
		session_token: &SecretString,
	) -> TesseraResult<BTreeMap<String, String>> {
		let sessions = lock(&self.sessions);
		let session = sessions
			.get(access_key_id)
			.filter(|s| s.session_token == *session_token.expose())
			.ok_or_else(|| {
				TesseraError::access_denied(operation, "the security token included in the request is invalid")
			})?;
		if self.now() >= session.expiration {
			return Err(TesseraError::ExpiredCredentials { operation });
		}
		Ok(session.tags.clone())
	}

	fn authorize(&self, operation: &'static str, request: RequestContext) -> TesseraResult<()> {
		let decision = evaluate(&self.resource_policy, &request);
		if decision.is_allowed() {
			Ok(())
		} else {
			Err(TesseraError::access_denied(
				operation,
				format!(
					"not authorized to perform {} on resource {}",
					request.action,
					request.resource.as_deref().unwrap_or("*")
				),
			))
		}
	}
}

/// Poison-tolerant lock; the state stays consistent between statements.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local cloud. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InMemoryCloud {
	state: Arc<CloudState>,
}

impl Default for InMemoryCloud {
	fn default() -> Self {
		Self::new(MemoryResources::default())
	}
}

impl InMemoryCloud {
	pub fn new(resources: MemoryResources) -> Self {
		let resource_policy = resource_access_policy(&resources.table_arn(), &resources.key_arn);
		let trust_policy = trust_policy(&resources.trusted_principal_arn);
		Self {
			state: Arc::new(CloudState {
				resources,
				resource_policy,
				trust_policy,
				master_key: envelope::generate_key(),
				sessions: Mutex::new(HashMap::new()),
				items: Mutex::new(HashMap::new()),
				clock_offset: Mutex::new(chrono::Duration::zero()),
				broker_calls: AtomicUsize::new(0),
				next_key: AtomicU64::new(1),
			}),
		}
	}

	pub fn resources(&self) -> &MemoryResources {
		&self.state.resources
	}

	/// Number of role assumptions attempted so far, including rejected ones.
	pub fn broker_calls(&self) -> usize {
		self.state.broker_calls.load(Ordering::SeqCst)
	}

	/// Move the simulated clock forward.
	pub fn advance_clock(&self, by: chrono::Duration) {
		let mut offset = lock(&self.state.clock_offset);
		*offset = *offset + by;
	}

	/// Stored item as-is, bypassing policy. Test and diagnostics only.
	pub fn raw_item(&self, partition_value: &str) -> Option<Item> {
		lock(&self.state.items).get(partition_value).cloned()
	}

	/// Overwrite a stored item, bypassing policy.
	pub fn put_raw_item(&self, partition_value: &str, item: Item) {
		lock(&self.state.items).insert(partition_value.to_string(), item);
	}

	fn issue_credentials(&self, tags: BTreeMap<String, String>, duration_secs: u64) -> TemporaryCredentials {
		let serial = self.state.next_key.fetch_add(1, Ordering::SeqCst);
		let access_key_id = format!("ASIAMEMORY{serial:010}");
		let secret_access_key = random_token(30);
		let session_token = random_token(64);
		let now = self.state.now();
		let expiration = now + chrono::Duration::seconds(duration_secs as i64);

		let mut sessions = lock(&self.state.sessions);
		// Expired sessions can never authenticate again.
		sessions.retain(|_, session| session.expiration > now);
		sessions.insert(
			access_key_id.clone(),
			Session {
				session_token: session_token.clone(),
				tags,
				expiration,
			},
		);

		TemporaryCredentials {
			access_key_id,
			secret_access_key: SecretString::new(secret_access_key),
			session_token: SecretString::new(session_token),
			expiration,
		}
	}
}

fn random_token(len: usize) -> String {
	let mut bytes = vec![0u8; len];
	rand::thread_rng().fill_bytes(&mut bytes);
	STANDARD.encode(bytes)
}

#[async_trait]
impl TrustBroker for InMemoryCloud {
	async fn assume_role(&self, request: AssumeRoleRequest) -> TesseraResult<TemporaryCredentials> {
		const OPERATION: &str = "sts:AssumeRole";
		self.state.broker_calls.fetch_add(1, Ordering::SeqCst);
		let resources = &self.state.resources;

		if request.role_arn != resources.role_arn {
			return Err(TesseraError::configuration(
				OPERATION,
				format!("role {} does not exist", request.role_arn),
			));
		}
		let duration = request.duration.as_secs();
		if !(900..=MAX_SESSION_SECONDS).contains(&duration) {
			return Err(TesseraError::configuration(
				OPERATION,
				format!("session duration {duration}s is outside 900..={MAX_SESSION_SECONDS}s"),
			));
		}

		let tags: BTreeMap<String, String> = request
			.tags
			.iter()
			.map(|t| (t.key.clone(), t.value.clone()))
			.collect();

		let mut actions = vec!["sts:AssumeRole"];
		if !tags.is_empty() {
			actions.push("sts:TagSession");
		}
		for action in actions {
			let mut context = RequestContext::new(action)
				.by(&resources.caller_arn)
				.with_key("aws:TagKeys", tags.keys().cloned().collect());
			for (key, value) in &tags {
				context = context.with_key(request_tag_key(key), vec![value.clone()]);
			}
			if !evaluate(&self.state.trust_policy, &context).is_allowed() {
				return Err(TesseraError::access_denied(
					OPERATION,
					format!(
						"{} is not authorized to perform {action} on resource {}",
						resources.caller_arn, resources.role_arn
					),
				));
			}
		}

		debug!(session_name = %request.session_name, "memory sts issued session");
		Ok(self.issue_credentials(tags, duration))
	}
}

impl ScopedClientFactory for InMemoryCloud {
	fn table(&self, context: &ScopedAccessContext, table_name: &str) -> Arc<dyn TableClient> {
		Arc::new(MemoryTable {
			state: self.state.clone(),
			caller: Caller::from_context(context),
			table_name: table_name.to_string(),
		})
	}

	fn keys(&self, context: &ScopedAccessContext) -> Arc<dyn KeyService> {
		Arc::new(MemoryKeys {
			state: self.state.clone(),
			caller: Caller::from_context(context),
		})
	}
}

struct Caller {
	access_key_id: String,
	session_token: SecretString,
}

impl Caller {
	fn from_context(context: &ScopedAccessContext) -> Self {
		let credentials = context.credentials();
		Self {
			access_key_id: credentials.access_key_id.clone(),
			session_token: credentials.session_token.clone(),
		}
	}
}

struct MemoryTable {
	state: Arc<CloudState>,
	caller: Caller,
	table_name: String,
}

impl MemoryTable {
	fn check(&self, operation: &'static str, action: &str, partition_value: &str) -> TesseraResult<()> {
		let tags = self.state.authenticate(
			operation,
			&self.caller.access_key_id,
			&self.caller.session_token,
		)?;
		if self.table_name != self.state.resources.table_name {
			return Err(TesseraError::configuration(
				operation,
				format!("requested resource not found: table {}", self.table_name),
			));
		}
		self.state.authorize(
			operation,
			RequestContext::new(action)
				.on(self.state.resources.table_arn())
				.with_principal_tags(tags)
				.with_key(LEADING_KEYS_CONDITION, vec![partition_value.to_string()]),
		)
	}
}

#[async_trait]
impl TableClient for MemoryTable {
	async fn get_item(&self, partition_value: &str) -> TesseraResult<Option<Item>> {
		self.check("dynamodb:GetItem", "dynamodb:GetItem", partition_value)?;
		Ok(lock(&self.state.items).get(partition_value).cloned())
	}

	async fn put_item(&self, item: Item) -> TesseraResult<()> {
		let partition_value = match item.get(PARTITION_ATTRIBUTE) {
			Some(AttributeValue::S(value)) => value.clone(),
			_ => {
				return Err(TesseraError::InvalidArgument(format!(
					"item is missing string key attribute {PARTITION_ATTRIBUTE}"
				)))
			}
		};
		self.check("dynamodb:PutItem", "dynamodb:PutItem", &partition_value)?;
		lock(&self.state.items).insert(partition_value, item);
		Ok(())
	}
}

struct MemoryKeys {
	state: Arc<CloudState>,
	caller: Caller,
}

impl MemoryKeys {
	fn check(&self, operation: &'static str, key_id: &str, context: &EncryptionContext) -> TesseraResult<()> {
		let tags = self.state.authenticate(
			operation,
			&self.caller.access_key_id,
			&self.caller.session_token,
		)?;
		let key_arn = &self.state.resources.key_arn;
		if key_id != key_arn && !key_arn.ends_with(&format!("key/{key_id}")) {
			return Err(TesseraError::configuration(
				operation,
				format!("key {key_id} does not exist"),
			));
		}

		let mut request = RequestContext::new(operation)
			.on(key_arn.clone())
			.with_principal_tags(tags);
		for (key, value) in context.iter() {
			request = request.with_key(format!("kms:EncryptionContext:{key}"), vec![value.clone()]);
		}
		self.state.authorize(operation, request)
	}

	fn aad(key_arn: &str, context: &EncryptionContext) -> Vec<u8> {
		let mut aad = key_arn.as_bytes().to_vec();
		aad.extend_from_slice(&context.canonical_bytes());
		aad
	}
}

#[async_trait]
impl KeyService for MemoryKeys {
	async fn generate_data_key(&self, key_id: &str, context: &EncryptionContext) -> TesseraResult<DataKey> {
		self.check("kms:GenerateDataKey", key_id, context)?;
		let plaintext = envelope::generate_key();
		let wrapped = envelope::seal(
			&self.state.master_key,
			plaintext.as_slice(),
			&Self::aad(&self.state.resources.key_arn, context),
		)?;
		Ok(DataKey {
			plaintext,
			ciphertext_blob: wrapped.to_bytes(),
		})
	}

	async fn decrypt(
		&self,
		key_id: &str,
		ciphertext_blob: &[u8],
		context: &EncryptionContext,
	) -> TesseraResult<Zeroizing<Vec<u8>>> {
		self.check("kms:Decrypt", key_id, context)?;
		let sealed = Sealed::from_bytes(ciphertext_blob)?;
		envelope::open(
			&self.state.master_key,
			&sealed,
			&Self::aad(&self.state.resources.key_arn, context),
		)
		.map_err(|_| TesseraError::Integrity("InvalidCiphertextException: data key does not match the encryption context".to_string()))
	}
}
