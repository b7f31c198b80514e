//! Process-local store, lost on restart

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{item_key, Item, RecordStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn item_count(&self) -> usize {
        self.items.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, item: Item) -> Result<(), StoreError> {
        let key = item_key(&item)?.to_string();
        self.items.write().await.insert(key, item);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.items.read().await.get(id).cloned())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
