//! Purpose: Wire shapes for products and metafields exchanged with the shop.
//! Exports: `Product`, `Metafield`, `ProductUpdate`, `MetafieldUpdate`.
//! Role: Plain serde records; no behavior beyond value normalization.
//! Invariants: Absent optional fields are skipped on the wire, never sent as null.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body_html: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Metafield {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub namespace: Option<String>,
    pub key: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub value: String,
}

impl Metafield {
    pub fn new(id: Option<u64>, namespace: &str, key: &str, value: &str) -> Self {
        Self {
            id,
            namespace: Some(namespace.to_string()),
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ProductUpdate {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metafields_global_title_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metafields_global_description_tag: Option<String>,
    pub metafields: Vec<MetafieldUpdate>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MetafieldUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: String,
}

// Metafield values arrive as strings, numbers, or booleans depending on their type.
fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}
