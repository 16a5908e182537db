// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Storage-level item representation.
//!
//! Mirrors the table's attribute value model so table clients stay
//! independent of any SDK, and converts to and from JSON tenant records.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Number, Value};

use crate::error::{TesseraError, TesseraResult};
use crate::tenant::TenantRecord;

/// A stored item: attribute name to value.
pub type Item = BTreeMap<String, AttributeValue>;

/// One stored attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
	S(String),
	/// Numbers travel as their decimal string form.
	N(String),
	Bool(bool),
	Null,
	B(Vec<u8>),
	L(Vec<AttributeValue>),
	M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
	pub fn as_s(&self) -> Option<&str> {
		match self {
			Self::S(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_b(&self) -> Option<&[u8]> {
		match self {
			Self::B(b) => Some(b),
			_ => None,
		}
	}

	pub fn as_m(&self) -> Option<&BTreeMap<String, AttributeValue>> {
		match self {
			Self::M(m) => Some(m),
			_ => None,
		}
	}

	pub fn from_json(value: &Value) -> Self {
		match value {
			Value::Null => Self::Null,
			Value::Bool(b) => Self::Bool(*b),
			Value::Number(n) => Self::N(n.to_string()),
			Value::String(s) => Self::S(s.clone()),
			Value::Array(items) => Self::L(items.iter().map(Self::from_json).collect()),
			Value::Object(map) => Self::M(
				map.iter()
					.map(|(k, v)| (k.clone(), Self::from_json(v)))
					.collect(),
			),
		}
	}

	/// Convert back to JSON. Binary values, which JSON cannot carry, are
	/// rendered as base64 strings.
	pub fn to_json(&self) -> TesseraResult<Value> {
		Ok(match self {
			Self::Null => Value::Null,
			Self::Bool(b) => Value::Bool(*b),
			Self::N(n) => Value::Number(n.parse::<Number>().map_err(|_| {
				TesseraError::Integrity(format!("stored number '{n}' is not numeric"))
			})?),
			Self::S(s) => Value::String(s.clone()),
			Self::B(bytes) => Value::String(STANDARD.encode(bytes)),
			Self::L(items) => Value::Array(
				items
					.iter()
					.map(Self::to_json)
					.collect::<TesseraResult<Vec<_>>>()?,
			),
			Self::M(map) => {
				let mut out = Map::new();
				for (k, v) in map {
					out.insert(k.clone(), v.to_json()?);
				}
				Value::Object(out)
			}
		})
	}
}

pub fn item_from_record(record: &TenantRecord) -> Item {
	record
		.fields()
		.iter()
		.map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
		.collect()
}

pub fn record_from_item(item: &Item) -> TesseraResult<TenantRecord> {
	let mut fields = Map::new();
	for (name, value) in item {
		fields.insert(name.clone(), value.to_json()?);
	}
	Ok(TenantRecord::from(fields))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn json_values_convert_both_ways() {
		let value = json!({
			"tenant_id": "tenantA",
			"color": "blue",
			"count": 3,
			"ratio": 0.5,
			"active": true,
			"missing": null,
			"tags": ["a", 1],
			"nested": {"k": "v"}
		});
		let record = TenantRecord::from(value.as_object().unwrap().clone());
		let item = item_from_record(&record);

		assert_eq!(item.get("count"), Some(&AttributeValue::N("3".to_string())));
		assert_eq!(item.get("active"), Some(&AttributeValue::Bool(true)));
		assert_eq!(record_from_item(&item).unwrap(), record);
	}

	#[test]
	fn binary_renders_as_base64() {
		let value = AttributeValue::B(vec![0xde, 0xad, 0xbe, 0xef]);
		assert_eq!(value.to_json().unwrap(), json!("3q2+7w=="));
	}

	#[test]
	fn malformed_number_is_integrity_error() {
		let value = AttributeValue::N("twelve".to_string());
		assert!(matches!(
			value.to_json().unwrap_err(),
			TesseraError::Integrity(_)
		));
	}
}
