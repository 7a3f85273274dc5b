//! The in-memory session object handed to and returned from the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Name of the session property carrying the cookie.
pub const COOKIE_PROPERTY: &str = "cookie";

/// Cookie field holding the expiration; never valid as a free-form attribute.
pub const COOKIE_EXPIRES: &str = "expires";

/// A session as seen by the middleware: arbitrary JSON properties plus an
/// optional cookie.
///
/// Serializes flat, with the cookie under the `cookie` key next to the other
/// properties:
///
/// ```
/// use serde_json::json;
/// use tower_sessions_sdb_store::SessionData;
///
/// let session: SessionData = serde_json::from_value(json!({
///     "cookie": { "expires": "2030-01-01T00:00:00Z", "path": "/" },
///     "user_id": 42,
/// }))
/// .unwrap();
///
/// assert_eq!(session.get("user_id"), Some(&json!(42)));
/// assert!(session.cookie.unwrap().expires.is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Cookie>,

    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookie = Some(cookie);
        self
    }

    /// Sets a property, returning the previous value if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Expiration carried by the cookie, if any.
    pub fn cookie_expires(&self) -> Option<OffsetDateTime> {
        self.cookie.as_ref().and_then(|cookie| cookie.expires)
    }
}

/// Session cookie settings stored alongside the session.
///
/// Only `expires` is interpreted by the store. Every other attribute
/// (`path`, `httpOnly`, `originalMaxAge`, ...) is kept verbatim; an
/// `expires` key in `attributes` is refused when the session is encoded.
///
/// `expires` is written as an RFC 3339 string and read back from either an
/// RFC 3339 string or an integer number of epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "expires_format")]
    pub expires: Option<OffsetDateTime>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Cookie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expires(mut self, expires: OffsetDateTime) -> Self {
        self.expires = Some(expires);
        self
    }

    /// The cookie reduced to plain data, as persisted in per-field mode.
    pub fn to_plain(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

mod expires_format {
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(expires) => {
                let text = expires.format(&Rfc3339).map_err(S::Error::custom)?;
                serializer.serialize_str(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Millis(ms)) => {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
                    .map(Some)
                    .map_err(D::Error::custom)
            }
            Some(Raw::Text(text)) => OffsetDateTime::parse(&text, &Rfc3339)
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}
