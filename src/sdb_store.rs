use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tower_sessions::{session::Id, session::Record, session_store, ExpiredDeletion, SessionStore};
use tracing::debug;

use crate::adapter::{Adapter, EXPIRES_ATTRIBUTE};
use crate::cleanup::{CleanupScheduler, SweepOutcome, Sweeper};
use crate::codec::Serialization;
use crate::config::{RemovalPolicy, SdbStoreBuilder};
use crate::error::{Error, Result};
use crate::expiry::{epoch_millis, from_epoch_millis, is_live, ExpiryPolicy};
use crate::session::{Cookie, SessionData};

/// A session store persisting records through a key-value [`Adapter`].
///
/// `SdbStore` owns the session lifecycle: it encodes sessions into flat
/// records, stamps every write with an `expires` timestamp, treats expired
/// records as absent on read, and runs a background task that sweeps
/// expired records out of the domain.
///
/// Clones share the adapter and the cleanup task. The task stops when
/// [`stop_cleanup`](Self::stop_cleanup) is called or the last clone is dropped.
///
/// # Usage
///
/// ```no_run
/// use std::time::Duration;
/// use tower_sessions_sdb_store::{MemoryAdapter, SdbStore, Serialization, SessionData};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SdbStore::builder()
///     .adapter(MemoryAdapter::new())
///     .with_domain_name("web_sessions")
///     .with_serialization(Serialization::PerField)
///     .with_cleanup_interval(Duration::from_secs(30))
///     .build()?;
///
/// let mut session = SessionData::new();
/// session.insert("user_id", 123);
/// store.commit("sid-1", &session).await?;
///
/// assert_eq!(store.fetch("sid-1").await?, Some(session));
/// # Ok(())
/// # }
/// ```
///
/// # Error Handling
///
/// - Adapter failures → [`Error::Adapter`], surfaced by `fetch`, `commit` and
///   `count`; `destroy` and `clear` follow the configured [`RemovalPolicy`].
/// - Encoding and decoding failures → [`Error::Serialization`].
///
/// Through the `tower-sessions` traits these map to
/// `session_store::Error::{Backend, Encode, Decode}`.
#[derive(Debug)]
pub struct SdbStore<A: Adapter> {
    adapter: Arc<A>,
    domain_name: String,
    serialization: Serialization,
    expiry: ExpiryPolicy,
    removal_policy: RemovalPolicy,
    cleanup: Arc<CleanupScheduler>,
}

impl<A: Adapter> Clone for SdbStore<A> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            domain_name: self.domain_name.clone(),
            serialization: self.serialization,
            expiry: self.expiry,
            removal_policy: self.removal_policy,
            cleanup: Arc::clone(&self.cleanup),
        }
    }
}

impl<A: Adapter> SdbStore<A> {
    /// Starts configuring a store; see [`SdbStoreBuilder`].
    pub fn builder() -> SdbStoreBuilder<A> {
        SdbStoreBuilder::default()
    }

    pub(crate) fn from_parts(
        adapter: Arc<A>,
        domain_name: String,
        serialization: Serialization,
        expiry: ExpiryPolicy,
        removal_policy: RemovalPolicy,
        cleanup: CleanupScheduler,
    ) -> Self {
        Self {
            adapter,
            domain_name,
            serialization,
            expiry,
            removal_policy,
            cleanup: Arc::new(cleanup),
        }
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn serialization(&self) -> Serialization {
        self.serialization
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Loads the session stored under `key`.
    ///
    /// Unknown keys yield `Ok(None)`. An expired record is destroyed and
    /// reported exactly like an unknown key.
    pub async fn fetch(&self, key: &str) -> Result<Option<SessionData>> {
        Ok(self
            .fetch_with_expiry(key)
            .await?
            .map(|(session, _)| session))
    }

    async fn fetch_with_expiry(&self, key: &str) -> Result<Option<(SessionData, Option<i64>)>> {
        let Some(attributes) = self.adapter.get_record(&self.domain_name, key).await? else {
            return Ok(None);
        };

        let now_ms = epoch_millis(OffsetDateTime::now_utc());
        if !is_live(&attributes, now_ms)? {
            debug!(domain = %self.domain_name, key, "session expired on read");
            self.destroy(key).await?;
            return Ok(None);
        }

        let session = self.serialization.decode(&attributes)?;
        let expires = attributes
            .get(EXPIRES_ATTRIBUTE)
            .and_then(|raw| raw.parse().ok());
        Ok(Some((session, expires)))
    }

    /// Writes `session` under `key`, replacing whatever was stored before.
    pub async fn commit(&self, key: &str, session: &SessionData) -> Result<()> {
        let mut attributes = self.serialization.encode(session)?;
        let expires = self
            .expiry
            .compute_expiry(session, OffsetDateTime::now_utc());
        attributes.insert(EXPIRES_ATTRIBUTE.to_string(), expires.to_string());

        self.adapter
            .put_record(&self.domain_name, key, attributes)
            .await?;
        Ok(())
    }

    /// Removes the session stored under `key`. Unknown keys are not an error.
    pub async fn destroy(&self, key: &str) -> Result<()> {
        let result = self.adapter.delete_record(&self.domain_name, key).await;
        self.removal_policy
            .settle(result, "destroy", &self.domain_name)
    }

    /// Number of records in the domain, as reported by the adapter.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.adapter.record_count(&self.domain_name).await?)
    }

    /// Drops the whole domain.
    pub async fn clear(&self) -> Result<()> {
        let result = self.adapter.drop_domain(&self.domain_name).await;
        self.removal_policy
            .settle(result, "clear", &self.domain_name)
    }

    /// Runs one cleanup sweep now, independently of the background task.
    pub async fn sweep_expired(&self) -> SweepOutcome {
        self.sweeper().sweep().await
    }

    /// Stops the background cleanup task and waits for it to exit.
    pub async fn stop_cleanup(&self) {
        self.cleanup.stop().await;
    }

    /// Whether the background cleanup task is still scheduled.
    pub fn cleanup_running(&self) -> bool {
        self.cleanup.is_running()
    }

    fn sweeper(&self) -> Sweeper<A> {
        Sweeper::new(Arc::clone(&self.adapter), self.domain_name.clone())
    }
}

fn record_to_session(record: &Record) -> SessionData {
    SessionData {
        cookie: Some(Cookie::new().with_expires(record.expiry_date)),
        values: record
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

fn session_to_record(
    id: Id,
    session: SessionData,
    expires: Option<i64>,
    fallback: OffsetDateTime,
) -> Record {
    let expiry_date = session
        .cookie_expires()
        .or_else(|| expires.and_then(from_epoch_millis))
        .unwrap_or(fallback);

    Record {
        id,
        data: session.values.into_iter().collect::<HashMap<_, _>>(),
        expiry_date,
    }
}

#[async_trait]
impl<A: Adapter> SessionStore for SdbStore<A> {
    /// Stores a new record, picking a fresh id if the current one is taken.
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        // Session ID collision mitigation
        while self
            .adapter
            .get_record(&self.domain_name, &record.id.to_string())
            .await
            .map_err(Error::from)?
            .is_some()
        {
            record.id = Id::default();
        }

        self.save(record).await
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.commit(&record.id.to_string(), &record_to_session(record))
            .await
            .map_err(Into::into)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        let fallback = from_epoch_millis(self.expiry.default_expiry(now)).unwrap_or(now);

        Ok(self
            .fetch_with_expiry(&session_id.to_string())
            .await?
            .map(|(session, expires)| session_to_record(*session_id, session, expires, fallback)))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.destroy(&session_id.to_string())
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl<A: Adapter> ExpiredDeletion for SdbStore<A> {
    /// Deletes every expired record, in batches, surfacing the first adapter error.
    async fn delete_expired(&self) -> session_store::Result<()> {
        let deleted = self.sweeper().drain().await.map_err(Error::from)?;
        debug!(domain = %self.domain_name, deleted, "expired sessions drained");
        Ok(())
    }
}
