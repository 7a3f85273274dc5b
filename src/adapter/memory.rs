use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{check_batch, Adapter, Attributes, Credentials, FromCredentials, Item, Select};
use crate::error::AdapterError;

type Domains = HashMap<String, BTreeMap<String, Attributes>>;

/// An in-process [`Adapter`] keeping every domain in memory.
///
/// Clones share the same underlying data, so a test can hold one handle
/// while the store (and its cleanup task) holds another. Unknown domains
/// behave as empty ones.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    domains: Arc<RwLock<Domains>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Domains> {
        self.domains.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Domains> {
        self.domains.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn get_record(&self, domain: &str, key: &str) -> Result<Option<Attributes>, AdapterError> {
        Ok(self
            .read()
            .get(domain)
            .and_then(|items| items.get(key))
            .cloned())
    }

    async fn put_record(
        &self,
        domain: &str,
        key: &str,
        attributes: Attributes,
    ) -> Result<(), AdapterError> {
        self.write()
            .entry(domain.to_string())
            .or_default()
            .insert(key.to_string(), attributes);
        Ok(())
    }

    async fn delete_record(&self, domain: &str, key: &str) -> Result<(), AdapterError> {
        if let Some(items) = self.write().get_mut(domain) {
            items.remove(key);
        }
        Ok(())
    }

    async fn batch_delete(&self, domain: &str, keys: &[String]) -> Result<(), AdapterError> {
        check_batch(keys)?;
        if let Some(items) = self.write().get_mut(domain) {
            for key in keys {
                items.remove(key);
            }
        }
        Ok(())
    }

    async fn select(&self, select: &Select) -> Result<Vec<Item>, AdapterError> {
        let domains = self.read();
        let Some(items) = domains.get(&select.domain) else {
            return Ok(Vec::new());
        };

        Ok(items
            .iter()
            .filter(|(_, attributes)| select.filter.matches(attributes))
            .take(select.limit)
            .map(|(name, attributes)| Item {
                name: name.clone(),
                attributes: attributes.clone(),
            })
            .collect())
    }

    async fn record_count(&self, domain: &str) -> Result<u64, AdapterError> {
        Ok(self.read().get(domain).map_or(0, |items| items.len() as u64))
    }

    async fn drop_domain(&self, domain: &str) -> Result<(), AdapterError> {
        self.write().remove(domain);
        Ok(())
    }
}

/// Credentials are accepted but not checked; each call yields an empty store.
impl FromCredentials for MemoryAdapter {
    fn from_credentials(_credentials: &Credentials) -> Result<Self, AdapterError> {
        Ok(Self::new())
    }
}
