//! Store configuration and the builder that validates it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapter::{Adapter, Credentials, FromCredentials};
use crate::cleanup::{CleanupScheduler, Sweeper};
use crate::codec::Serialization;
use crate::error::{AdapterError, Error, Result};
use crate::expiry::ExpiryPolicy;
use crate::sdb_store::SdbStore;

/// Default domain holding session records.
pub const DEFAULT_DOMAIN_NAME: &str = "sessions";

/// Default pause between two cleanup sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_millis(60_000);

/// Default lifetime of sessions whose cookie has no expiration (14 days).
pub const DEFAULT_EXPIRATION: Duration = Duration::from_millis(1000 * 60 * 60 * 24 * 14);

/// What `destroy` and `clear` do with adapter failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalPolicy {
    /// Log the failure at `warn` and report success. Removal is idempotent
    /// from the caller's point of view; leftovers expire or get swept.
    #[default]
    BestEffort,
    /// Surface the adapter error to the caller.
    Strict,
}

impl RemovalPolicy {
    pub(crate) fn settle(
        self,
        result: std::result::Result<(), AdapterError>,
        operation: &'static str,
        domain: &str,
    ) -> Result<()> {
        match (self, result) {
            (_, Ok(())) => Ok(()),
            (RemovalPolicy::BestEffort, Err(e)) => {
                warn!(operation, domain, error = %e, "removal failed, ignoring");
                Ok(())
            }
            (RemovalPolicy::Strict, Err(e)) => Err(e.into()),
        }
    }
}

/// Process-wide store options.
///
/// Deserializes from configuration files with durations given in
/// milliseconds; every key is optional:
///
/// ```
/// use std::time::Duration;
/// use tower_sessions_sdb_store::{Serialization, SdbStoreConfig};
///
/// let config: SdbStoreConfig = serde_json::from_str(
///     r#"{ "domain_name": "web", "serialization": "per-field", "cleanup_interval": 1000 }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.domain_name, "web");
/// assert_eq!(config.serialization, Serialization::PerField);
/// assert_eq!(config.cleanup_interval, Duration::from_secs(1));
/// assert_eq!(config.default_expiration, Duration::from_secs(14 * 24 * 60 * 60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdbStoreConfig {
    pub domain_name: String,
    pub serialization: Serialization,
    #[serde(with = "millis")]
    pub cleanup_interval: Duration,
    #[serde(with = "millis")]
    pub default_expiration: Duration,
    pub removal_policy: RemovalPolicy,
}

impl Default for SdbStoreConfig {
    fn default() -> Self {
        Self {
            domain_name: DEFAULT_DOMAIN_NAME.to_string(),
            serialization: Serialization::default(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            default_expiration: DEFAULT_EXPIRATION,
            removal_policy: RemovalPolicy::default(),
        }
    }
}

impl SdbStoreConfig {
    fn validate(&self) -> Result<()> {
        if self.domain_name.is_empty() {
            return Err(Error::Configuration("`domain_name` must not be empty".into()));
        }
        if self.cleanup_interval.is_zero() {
            return Err(Error::Configuration("`cleanup_interval` must be positive".into()));
        }
        if self.default_expiration.is_zero() {
            return Err(Error::Configuration("`default_expiration` must be positive".into()));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

type Connect<A> = fn(&Credentials) -> std::result::Result<A, AdapterError>;

/// Builder for [`SdbStore`]; obtain one with [`SdbStore::builder`].
///
/// Exactly one of [`adapter`](Self::adapter) or
/// [`credentials`](Self::credentials) must be given.
pub struct SdbStoreBuilder<A: Adapter> {
    config: SdbStoreConfig,
    adapter: Option<A>,
    credentials: Option<(Credentials, Connect<A>)>,
}

impl<A: Adapter> Default for SdbStoreBuilder<A> {
    fn default() -> Self {
        Self {
            config: SdbStoreConfig::default(),
            adapter: None,
            credentials: None,
        }
    }
}

impl<A: Adapter> SdbStoreBuilder<A> {
    /// Replaces every option at once, e.g. with a deserialized config.
    pub fn with_config(mut self, config: SdbStoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the domain (table) session records live in.
    pub fn with_domain_name(mut self, domain_name: impl Into<String>) -> Self {
        self.config.domain_name = domain_name.into();
        self
    }

    pub fn with_serialization(mut self, serialization: Serialization) -> Self {
        self.config.serialization = serialization;
        self
    }

    /// Sets the pause between the end of one cleanup sweep and the start of the next.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    /// Sets how long sessions without a cookie expiration are kept.
    pub fn with_default_expiration(mut self, span: Duration) -> Self {
        self.config.default_expiration = span;
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.config.removal_policy = policy;
        self
    }

    /// Uses an already constructed adapter.
    pub fn adapter(mut self, adapter: A) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Validates the options, then starts the store and its cleanup task.
    ///
    /// Must be called from within a Tokio runtime, which hosts the cleanup task.
    pub fn build(self) -> Result<SdbStore<A>> {
        self.config.validate()?;

        let adapter = match (self.adapter, self.credentials) {
            (Some(_), Some(_)) => {
                return Err(Error::Configuration(
                    "give either an adapter or credentials, not both".into(),
                ))
            }
            (Some(adapter), None) => adapter,
            (None, Some((credentials, connect))) => {
                if !credentials.is_complete() {
                    return Err(Error::Configuration(
                        "credentials need both a key id and a secret".into(),
                    ));
                }
                connect(&credentials)?
            }
            (None, None) => {
                return Err(Error::Configuration(
                    "required option `adapter` (or credentials) missing".into(),
                ))
            }
        };

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::Configuration(format!("the cleanup task needs a Tokio runtime: {e}"))
        })?;

        let adapter = Arc::new(adapter);
        let cleanup = CleanupScheduler::spawn(
            &runtime,
            Sweeper::new(Arc::clone(&adapter), self.config.domain_name.clone()),
            self.config.cleanup_interval,
        );

        Ok(SdbStore::from_parts(
            adapter,
            self.config.domain_name,
            self.config.serialization,
            ExpiryPolicy::new(self.config.default_expiration),
            self.config.removal_policy,
            cleanup,
        ))
    }
}

impl<A: FromCredentials> SdbStoreBuilder<A> {
    /// Builds the adapter from an access key pair when the store is built.
    pub fn credentials(mut self, key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        let credentials = Credentials {
            key_id: key_id.into(),
            secret: secret.into(),
        };
        self.credentials = Some((credentials, A::from_credentials));
        self
    }
}
