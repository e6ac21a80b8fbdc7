use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;

/// Key/value state shared by the tasks of one graph run.
///
/// Values are stored as JSON, so anything `Serialize + DeserializeOwned` can
/// travel between tasks. Clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.into(), value);
        Ok(())
    }

    /// Returns `None` when the key is missing or holds a value of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}
