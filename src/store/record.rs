//! The persisted detection record

use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::attribute::{from_attribute, to_attribute, AttributeValue, Item};
use super::StoreError;

/// One uploaded image and what the classifier said about it
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Uuid,
    /// Seconds since the epoch, fractional
    pub created_at: f64,
    /// Base64 payload exactly as received
    pub image: String,
    pub meta: Value,
    /// Empty object until the classifier result is written back
    pub classification: Value,
}

impl Record {
    /// Create a record with a fresh id, the current time and an empty
    /// classification
    pub fn new(image: String, meta: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now_seconds(),
            image,
            meta,
            classification: Value::Object(Map::new()),
        }
    }

    pub fn has_classification(&self) -> bool {
        self.classification
            .as_object()
            .is_some_and(|object| !object.is_empty())
    }

    /// Store representation of the record
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert("id".to_string(), AttributeValue::S(self.id.to_string()));
        item.insert("created_at".to_string(), to_attribute(&json!(self.created_at)));
        item.insert("image".to_string(), AttributeValue::S(self.image.clone()));
        item.insert("meta".to_string(), to_attribute(&self.meta));
        item.insert(
            "classification".to_string(),
            to_attribute(&self.classification),
        );
        item
    }

    /// Rebuild a record from its store representation
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        let id = match attribute(item, "id")? {
            AttributeValue::S(raw) => Uuid::parse_str(raw).map_err(|_| StoreError::InvalidAttribute {
                name: "id".to_string(),
                expected: "UUID string",
            })?,
            _ => return Err(type_error("id", "S")),
        };

        let created_at = match attribute(item, "created_at")? {
            number @ AttributeValue::N(_) => from_attribute(number)?.as_f64().unwrap_or_default(),
            _ => return Err(type_error("created_at", "N")),
        };

        let image = match attribute(item, "image")? {
            AttributeValue::S(image) => image.clone(),
            _ => return Err(type_error("image", "S")),
        };

        Ok(Self {
            id,
            created_at,
            image,
            meta: from_attribute(attribute(item, "meta")?)?,
            classification: from_attribute(attribute(item, "classification")?)?,
        })
    }

    /// JSON view used by the lookup route
    pub fn to_json(&self, include_image: bool) -> Value {
        let mut body = json!({
            "id": self.id,
            "created_at": self.created_at,
            "meta": self.meta,
            "classification": self.classification,
        });
        if include_image {
            body["image"] = Value::String(self.image.clone());
        }
        body
    }
}

fn attribute<'a>(item: &'a Item, name: &str) -> Result<&'a AttributeValue, StoreError> {
    item.get(name)
        .ok_or_else(|| StoreError::MissingAttribute(name.to_string()))
}

fn type_error(name: &str, expected: &'static str) -> StoreError {
    StoreError::InvalidAttribute {
        name: name.to_string(),
        expected,
    }
}

#[allow(clippy::cast_precision_loss)]
fn now_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}
