//! The key-value capability set the session store is written against.
//!
//! A backend only has to provide flat records (string attributes keyed by an
//! item name inside a domain), a bounded batch delete and a single
//! "attribute less than" query. Two implementations ship with the crate:
//!
//! - [`MemoryAdapter`]: in-process, for tests and single-node deployments.
//! - [`SeaOrmAdapter`]: a SQL table accessed through Sea-ORM.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::AdapterError;

pub mod memory;
pub mod sql;

pub use memory::MemoryAdapter;
pub use sql::SeaOrmAdapter;

/// Maximum number of keys a single [`Adapter::batch_delete`] call may carry.
///
/// This mirrors the bulk-delete limit of the underlying store and is not tunable.
pub const BATCH_DELETE_LIMIT: usize = 25;

/// Attribute holding a record's expiration time in epoch milliseconds.
pub const EXPIRES_ATTRIBUTE: &str = "expires";

/// A flat record: attribute name to string value.
pub type Attributes = BTreeMap<String, String>;

/// One hit returned by [`Adapter::select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// The item name (`$ItemName`), i.e. the session key.
    pub name: String,
    pub attributes: Attributes,
}

/// Predicate evaluated by the store for [`Adapter::select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches items whose `attribute` holds an integer strictly below `value`.
    ///
    /// Items lacking the attribute, or holding something that is not an
    /// integer, never match.
    LessThan { attribute: String, value: i64 },
}

impl Filter {
    /// Evaluates the filter against a record on the client side.
    pub fn matches(&self, attributes: &Attributes) -> bool {
        match self {
            Filter::LessThan { attribute, value } => attributes
                .get(attribute)
                .and_then(|v| v.parse::<i64>().ok())
                .is_some_and(|v| v < *value),
        }
    }
}

/// A bounded query against one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub domain: String,
    pub filter: Filter,
    pub limit: usize,
}

impl Select {
    /// Renders the query in SimpleDB select syntax.
    ///
    /// Values are zero-padded so stores that compare attributes
    /// lexicographically order timestamps correctly.
    pub fn to_expression(&self) -> String {
        match &self.filter {
            Filter::LessThan { attribute, value } => format!(
                "select itemName() from `{}` where `{}` < '{:016}' limit {}",
                self.domain, attribute, value, self.limit
            ),
        }
    }
}

/// Storage operations a session store needs from its backend.
///
/// Every call reports its own error; the store never retries foreground
/// operations. Writes replace the whole record.
#[async_trait]
pub trait Adapter: Debug + Send + Sync + 'static {
    /// Loads a record, `Ok(None)` when the key is unknown.
    async fn get_record(&self, domain: &str, key: &str) -> Result<Option<Attributes>, AdapterError>;

    /// Writes a record, replacing any previous attributes for `key`.
    async fn put_record(
        &self,
        domain: &str,
        key: &str,
        attributes: Attributes,
    ) -> Result<(), AdapterError>;

    /// Deletes one record. Deleting an unknown key is not an error.
    async fn delete_record(&self, domain: &str, key: &str) -> Result<(), AdapterError>;

    /// Deletes up to [`BATCH_DELETE_LIMIT`] records in one call.
    async fn batch_delete(&self, domain: &str, keys: &[String]) -> Result<(), AdapterError>;

    /// Returns at most `select.limit` items matching the filter.
    async fn select(&self, select: &Select) -> Result<Vec<Item>, AdapterError>;

    /// Number of records in the domain.
    async fn record_count(&self, domain: &str) -> Result<u64, AdapterError>;

    /// Removes the domain and everything in it.
    async fn drop_domain(&self, domain: &str) -> Result<(), AdapterError>;
}

/// Access key pair for backends that build their own client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key_id: String,
    pub secret: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Both halves of the pair are present.
    pub fn is_complete(&self) -> bool {
        !self.key_id.is_empty() && !self.secret.is_empty()
    }
}

/// Adapters that can be constructed from a [`Credentials`] pair.
pub trait FromCredentials: Adapter + Sized {
    fn from_credentials(credentials: &Credentials) -> Result<Self, AdapterError>;
}

pub(crate) fn check_batch(keys: &[String]) -> Result<(), AdapterError> {
    if keys.len() > BATCH_DELETE_LIMIT {
        return Err(AdapterError::BatchTooLarge {
            limit: BATCH_DELETE_LIMIT,
            requested: keys.len(),
        });
    }
    Ok(())
}
