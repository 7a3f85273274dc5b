//! Mapping between [`SessionData`] and flat store records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::{Attributes, EXPIRES_ATTRIBUTE};
use crate::error::SerializationError;
use crate::session::{Cookie, SessionData, COOKIE_EXPIRES, COOKIE_PROPERTY};

/// Attribute holding the whole session in opaque-blob mode.
pub const SESSION_ATTRIBUTE: &str = "session";

/// Identity attribute some stores echo back inside records.
pub const ITEM_NAME_ATTRIBUTE: &str = "$ItemName";

/// How a session is laid out in a record. Chosen once, at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Serialization {
    /// The whole session as one JSON string under `session`.
    #[default]
    OpaqueBlob,
    /// One attribute per session property, each holding that property's JSON.
    PerField,
}

impl Serialization {
    /// Encodes `session` into record attributes (without `expires`).
    pub fn encode(self, session: &SessionData) -> Result<Attributes, SerializationError> {
        if session.values.contains_key(COOKIE_PROPERTY) {
            return Err(SerializationError::ReservedAttribute(COOKIE_PROPERTY.to_string()));
        }
        if let Some(cookie) = &session.cookie {
            if cookie.attributes.contains_key(COOKIE_EXPIRES) {
                return Err(SerializationError::ReservedAttribute(format!(
                    "{COOKIE_PROPERTY}.{COOKIE_EXPIRES}"
                )));
            }
        }

        match self {
            Serialization::OpaqueBlob => {
                let blob = serde_json::to_string(session).map_err(|source| {
                    SerializationError::Encode {
                        field: SESSION_ATTRIBUTE.to_string(),
                        source,
                    }
                })?;
                Ok(Attributes::from([(SESSION_ATTRIBUTE.to_string(), blob)]))
            }
            Serialization::PerField => {
                let mut attributes = Attributes::new();

                for (name, value) in &session.values {
                    if is_reserved(name) {
                        return Err(SerializationError::ReservedAttribute(name.clone()));
                    }
                    attributes.insert(name.clone(), encode_field(name, value)?);
                }

                if let Some(cookie) = &session.cookie {
                    let plain = cookie
                        .to_plain()
                        .map_err(|source| SerializationError::Encode {
                            field: COOKIE_PROPERTY.to_string(),
                            source,
                        })?;
                    attributes.insert(COOKIE_PROPERTY.to_string(), encode_field(COOKIE_PROPERTY, &plain)?);
                }

                Ok(attributes)
            }
        }
    }

    /// Rebuilds a session from record attributes.
    ///
    /// Any attribute that fails to decode fails the whole record.
    pub fn decode(self, attributes: &Attributes) -> Result<SessionData, SerializationError> {
        match self {
            Serialization::OpaqueBlob => {
                let blob = attributes
                    .get(SESSION_ATTRIBUTE)
                    .ok_or(SerializationError::MissingBlob(SESSION_ATTRIBUTE))?;
                serde_json::from_str(blob).map_err(|source| SerializationError::Decode {
                    field: SESSION_ATTRIBUTE.to_string(),
                    source,
                })
            }
            Serialization::PerField => {
                let mut session = SessionData::new();

                for (name, raw) in attributes {
                    if is_reserved(name) {
                        continue;
                    }
                    let decode_err = |source: serde_json::Error| SerializationError::Decode {
                        field: name.clone(),
                        source,
                    };

                    if name == COOKIE_PROPERTY {
                        session.cookie = Some(serde_json::from_str::<Cookie>(raw).map_err(decode_err)?);
                    } else {
                        let value: Value = serde_json::from_str(raw).map_err(decode_err)?;
                        session.values.insert(name.clone(), value);
                    }
                }

                Ok(session)
            }
        }
    }
}

fn is_reserved(name: &str) -> bool {
    name == ITEM_NAME_ATTRIBUTE || name == EXPIRES_ATTRIBUTE
}

fn encode_field(name: &str, value: &Value) -> Result<String, SerializationError> {
    serde_json::to_string(value).map_err(|source| SerializationError::Encode {
        field: name.to_string(),
        source,
    })
}
