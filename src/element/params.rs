//! Parameter stores
//!
//! [`ParamManager`] is shared by every element of a graph and owned by the
//! graph's builder. [`LocalParams`] belongs to a single element and is
//! dropped with it.

use crate::core::errors::Result;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;

/// Graph-wide key/value store, safe to use from any worker
#[derive(Debug, Default)]
pub struct ParamManager {
    data: DashMap<String, Value>,
}

impl ParamManager {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.data.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Typed read; `Ok(None)` when the key is absent
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value().clone())?)),
            None => Ok(None),
        }
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    /// Apply `update` to the stored value in place, starting from `Null`
    pub fn update<F>(&self, key: &str, update: F)
    where
        F: FnOnce(&mut Value),
    {
        let mut entry = self.data.entry(key.to_string()).or_insert(Value::Null);
        update(entry.value_mut());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, value)| value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

/// Element-private parameters holding arbitrary owned values
#[derive(Default)]
pub struct LocalParams {
    values: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl LocalParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning true when it replaced an existing entry
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> bool {
        self.values
            .write()
            .insert(key.into(), Box::new(value))
            .is_some()
    }

    /// Clone out a value; `None` when absent or stored with another type
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.values
            .read()
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Run `f` against a stored value without cloning it
    pub fn with_mut<T: Any, R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut values = self.values.write();
        values
            .get_mut(key)
            .and_then(|value| value.downcast_mut::<T>())
            .map(f)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.values.write().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl std::fmt::Debug for LocalParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self.values.read();
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();
        f.debug_struct("LocalParams").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_param_manager_typed_access() {
        let params = ParamManager::new();
        params.set("origin", Point { x: 1, y: 2 }).unwrap();

        let point: Option<Point> = params.get("origin").unwrap();
        assert_eq!(point, Some(Point { x: 1, y: 2 }));
        assert_eq!(params.get::<Point>("missing").unwrap(), None);
        assert_eq!(params.get_value("origin"), Some(json!({ "x": 1, "y": 2 })));
        assert_eq!(params.get_value("missing"), None);
        assert!(params.get::<String>("origin").is_err());
    }

    #[test]
    fn test_param_manager_concurrent_update() {
        let params = Arc::new(ParamManager::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let params = Arc::clone(&params);
                thread::spawn(move || {
                    for _ in 0..100 {
                        params.update("hits", |value| {
                            *value = json!(value.as_u64().unwrap_or(0) + 1);
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(params.get::<u64>("hits").unwrap(), Some(800));
    }

    #[test]
    fn test_param_manager_remove_and_clear() {
        let params = ParamManager::new();
        params.set("a", 1).unwrap();
        params.set("b", 2).unwrap();
        assert_eq!(params.remove("a"), Some(json!(1)));
        assert!(!params.contains("a"));
        params.clear();
        assert!(params.is_empty());
    }

    #[test]
    fn test_local_params_owns_values() {
        let local = LocalParams::new();
        assert!(!local.insert("count", 3usize));
        assert!(local.insert("count", 4usize));
        assert_eq!(local.get::<usize>("count"), Some(4));
        assert_eq!(local.get::<String>("count"), None);

        local.with_mut::<usize, _>("count", |count| *count += 1);
        assert_eq!(local.get::<usize>("count"), Some(5));

        assert!(local.remove("count"));
        assert!(local.is_empty());
    }

    #[test]
    fn test_local_params_drop_releases_values() {
        let shared = Arc::new(());
        {
            let local = LocalParams::new();
            local.insert("handle", Arc::clone(&shared));
            assert_eq!(Arc::strong_count(&shared), 2);
        }
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
