//! Durable record store
//!
//! The detector only needs overwrite-by-key `put`; `get` backs the lookup
//! route. Backends are picked from `store.backend`.

mod attribute;
mod file;
mod memory;
mod record;

use async_trait::async_trait;
use std::sync::Arc;

pub use attribute::{from_attribute, to_attribute, AttributeValue, Item};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::Record;

use crate::config::{StoreBackend, StoreConfig};

/// Name of the key attribute every item carries
pub const KEY_ATTRIBUTE: &str = "id";

/// Errors returned by record stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid stored number: {0:?}")]
    InvalidNumber(String),
    #[error("item is missing attribute '{0}'")]
    MissingAttribute(String),
    #[error("attribute '{name}' must be of type {expected}")]
    InvalidAttribute { name: String, expected: &'static str },
    #[error("invalid item key: {0:?}")]
    InvalidKey(String),
}

/// Keyed item storage with overwrite semantics
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Write `item`, fully replacing any item with the same key
    async fn put(&self, item: Item) -> Result<(), StoreError>;

    /// Read the item stored under `id`
    async fn get(&self, id: &str) -> Result<Option<Item>, StoreError>;

    /// Short description for startup logging
    fn describe(&self) -> String;
}

/// Build the backend named in the configuration
pub fn open(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    Ok(match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::new(&config.path, &config.table)?),
    })
}

/// Extract the key of an item
pub fn item_key(item: &Item) -> Result<&str, StoreError> {
    match item.get(KEY_ATTRIBUTE) {
        Some(AttributeValue::S(key)) if !key.is_empty() => Ok(key),
        Some(_) => Err(StoreError::InvalidAttribute {
            name: KEY_ATTRIBUTE.to_string(),
            expected: "S",
        }),
        None => Err(StoreError::MissingAttribute(KEY_ATTRIBUTE.to_string())),
    }
}
