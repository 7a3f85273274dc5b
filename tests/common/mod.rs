#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tower_sessions_sdb_store::{
    Adapter, AdapterError, Attributes, Item, MemoryAdapter, Select, EXPIRES_ATTRIBUTE,
};

/// A [`MemoryAdapter`] whose operations can be made to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct FlakyAdapter {
    pub inner: MemoryAdapter,
    pub fail_select: Arc<AtomicBool>,
    pub fail_deletes: Arc<AtomicBool>,
    pub fail_drop: Arc<AtomicBool>,
    /// Batch deletes report success without removing anything, like a store
    /// that has not caught up with its own writes.
    pub stale_deletes: Arc<AtomicBool>,
    pub panic_select: Arc<AtomicBool>,
    pub select_delay_ms: Arc<AtomicU64>,
    pub selects: Arc<AtomicUsize>,
    pub active_selects: Arc<AtomicUsize>,
    pub max_active_selects: Arc<AtomicUsize>,
    pub batch_deletes: Arc<AtomicUsize>,
}

impl FlakyAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_calls(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    pub fn batch_delete_calls(&self) -> usize {
        self.batch_deletes.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_selects(&self) -> usize {
        self.max_active_selects.load(Ordering::SeqCst)
    }

    pub fn delay_selects(&self, delay: Duration) {
        self.select_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

fn injected(op: &str) -> AdapterError {
    AdapterError::Other(format!("injected {op} failure").into())
}

#[async_trait]
impl Adapter for FlakyAdapter {
    async fn get_record(&self, domain: &str, key: &str) -> Result<Option<Attributes>, AdapterError> {
        self.inner.get_record(domain, key).await
    }

    async fn put_record(
        &self,
        domain: &str,
        key: &str,
        attributes: Attributes,
    ) -> Result<(), AdapterError> {
        self.inner.put_record(domain, key, attributes).await
    }

    async fn delete_record(&self, domain: &str, key: &str) -> Result<(), AdapterError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete_record(domain, key).await
    }

    async fn batch_delete(&self, domain: &str, keys: &[String]) -> Result<(), AdapterError> {
        self.batch_deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("batch delete"));
        }
        if self.stale_deletes.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.batch_delete(domain, keys).await
    }

    async fn select(&self, select: &Select) -> Result<Vec<Item>, AdapterError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        if self.panic_select.load(Ordering::SeqCst) {
            panic!("injected select panic");
        }
        if self.fail_select.load(Ordering::SeqCst) {
            return Err(injected("select"));
        }

        let active = self.active_selects.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_selects.fetch_max(active, Ordering::SeqCst);
        let delay = self.select_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let result = self.inner.select(select).await;
        self.active_selects.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn record_count(&self, domain: &str) -> Result<u64, AdapterError> {
        self.inner.record_count(domain).await
    }

    async fn drop_domain(&self, domain: &str) -> Result<(), AdapterError> {
        if self.fail_drop.load(Ordering::SeqCst) {
            return Err(injected("drop domain"));
        }
        self.inner.drop_domain(domain).await
    }
}

/// Writes `count` records that expired long ago directly through the adapter.
pub async fn seed_expired<A: Adapter>(adapter: &A, domain: &str, count: usize) {
    for i in 0..count {
        let attributes = Attributes::from([
            (EXPIRES_ATTRIBUTE.to_string(), "1".to_string()),
            ("session".to_string(), "{}".to_string()),
        ]);
        adapter
            .put_record(domain, &format!("expired-{i:03}"), attributes)
            .await
            .unwrap();
    }
}
