// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! DynamoDB table client authenticated with tenant-scoped credentials.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue as DynamoValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, Utc};
use tessera_core::{AttributeValue, Item, TableClient, TesseraError, TesseraResult, PARTITION_ATTRIBUTE};

use crate::error::classify;

pub struct DynamoTable {
	client: DynamoClient,
	table_name: String,
	expiration: DateTime<Utc>,
}

impl DynamoTable {
	pub fn new(client: DynamoClient, table_name: impl Into<String>, expiration: DateTime<Utc>) -> Self {
		Self {
			client,
			table_name: table_name.into(),
			expiration,
		}
	}
}

#[async_trait]
impl TableClient for DynamoTable {
	async fn get_item(&self, partition_value: &str) -> TesseraResult<Option<Item>> {
		const OPERATION: &str = "dynamodb:GetItem";
		let output = self
			.client
			.get_item()
			.table_name(&self.table_name)
			.key(PARTITION_ATTRIBUTE, DynamoValue::S(partition_value.to_string()))
			.consistent_read(true)
			.send()
			.await
			.map_err(|e| classify(OPERATION, e, Some(self.expiration)))?;

		output.item().map(from_dynamo_item).transpose()
	}

	async fn put_item(&self, item: Item) -> TesseraResult<()> {
		const OPERATION: &str = "dynamodb:PutItem";
		self.client
			.put_item()
			.table_name(&self.table_name)
			.set_item(Some(to_dynamo_item(item)))
			.send()
			.await
			.map_err(|e| classify(OPERATION, e, Some(self.expiration)))?;
		Ok(())
	}
}

pub(crate) fn to_dynamo_item(item: Item) -> HashMap<String, DynamoValue> {
	item.into_iter().map(|(k, v)| (k, to_dynamo(v))).collect()
}

pub(crate) fn from_dynamo_item(item: &HashMap<String, DynamoValue>) -> TesseraResult<Item> {
	item.iter()
		.map(|(k, v)| Ok((k.clone(), from_dynamo(v)?)))
		.collect()
}

fn to_dynamo(value: AttributeValue) -> DynamoValue {
	match value {
		AttributeValue::S(s) => DynamoValue::S(s),
		AttributeValue::N(n) => DynamoValue::N(n),
		AttributeValue::Bool(b) => DynamoValue::Bool(b),
		AttributeValue::Null => DynamoValue::Null(true),
		AttributeValue::B(bytes) => DynamoValue::B(Blob::new(bytes)),
		AttributeValue::L(items) => DynamoValue::L(items.into_iter().map(to_dynamo).collect()),
		AttributeValue::M(map) => {
			DynamoValue::M(map.into_iter().map(|(k, v)| (k, to_dynamo(v))).collect())
		}
	}
}

fn from_dynamo(value: &DynamoValue) -> TesseraResult<AttributeValue> {
	Ok(match value {
		DynamoValue::S(s) => AttributeValue::S(s.clone()),
		DynamoValue::N(n) => AttributeValue::N(n.clone()),
		DynamoValue::Bool(b) => AttributeValue::Bool(*b),
		DynamoValue::Null(_) => AttributeValue::Null,
		DynamoValue::B(blob) => AttributeValue::B(blob.as_ref().to_vec()),
		DynamoValue::L(items) => AttributeValue::L(
			items
				.iter()
				.map(from_dynamo)
				.collect::<TesseraResult<Vec<_>>>()?,
		),
		DynamoValue::M(map) => AttributeValue::M(
			map.iter()
				.map(|(k, v)| Ok((k.clone(), from_dynamo(v)?)))
				.collect::<TesseraResult<_>>()?,
		),
		DynamoValue::Ss(values) => {
			AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect())
		}
		DynamoValue::Ns(values) => {
			AttributeValue::L(values.iter().cloned().map(AttributeValue::N).collect())
		}
		DynamoValue::Bs(values) => AttributeValue::L(
			values
				.iter()
				.map(|blob| AttributeValue::B(blob.as_ref().to_vec()))
				.collect(),
		),
		other => {
			return Err(TesseraError::Integrity(format!(
				"unsupported stored attribute type: {other:?}"
			)))
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	#[test]
	fn item_converts_to_sdk_values() {
		let item: Item = BTreeMap::from([
			(PARTITION_ATTRIBUTE.to_string(), AttributeValue::S("tenantA".into())),
			("sealed".to_string(), AttributeValue::B(vec![1, 2, 3])),
			("none".to_string(), AttributeValue::Null),
			(
				"nested".to_string(),
				AttributeValue::M(BTreeMap::from([(
					"list".to_string(),
					AttributeValue::L(vec![AttributeValue::N("1".into()), AttributeValue::Bool(false)]),
				)])),
			),
		]);

		let sdk = to_dynamo_item(item.clone());
		assert_eq!(sdk.get(PARTITION_ATTRIBUTE), Some(&DynamoValue::S("tenantA".into())));
		assert_eq!(sdk.get("none"), Some(&DynamoValue::Null(true)));
		assert_eq!(sdk.get("sealed"), Some(&DynamoValue::B(Blob::new(vec![1, 2, 3]))));

		assert_eq!(from_dynamo_item(&sdk).unwrap(), item);
	}

	#[test]
	fn sets_read_back_as_lists() {
		let sdk = HashMap::from([(
			"tags".to_string(),
			DynamoValue::Ss(vec!["a".to_string(), "b".to_string()]),
		)]);
		let item = from_dynamo_item(&sdk).unwrap();
		assert_eq!(
			item["tags"],
			AttributeValue::L(vec![AttributeValue::S("a".into()), AttributeValue::S("b".into())])
		);
	}
}
