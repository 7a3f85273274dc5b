//! Expiration timestamps written at commit and checked at fetch.
//!
//! Timestamps are integer epoch milliseconds, stored in the `expires`
//! attribute of every record the store writes.

use std::time::Duration;

use time::OffsetDateTime;

use crate::adapter::{Attributes, EXPIRES_ATTRIBUTE};
use crate::error::SerializationError;
use crate::session::SessionData;

/// Converts a timestamp to epoch milliseconds, truncating sub-millisecond precision.
pub fn epoch_millis(time: OffsetDateTime) -> i64 {
    (time.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Converts epoch milliseconds back to a timestamp, if representable.
pub fn from_epoch_millis(ms: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
}

/// Decides how long records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    default_span: Duration,
}

impl ExpiryPolicy {
    pub fn new(default_span: Duration) -> Self {
        Self { default_span }
    }

    pub fn default_span(&self) -> Duration {
        self.default_span
    }

    /// The `expires` value to persist for `session`.
    ///
    /// A cookie expiration is used verbatim. Without one (a browser-session
    /// cookie, or no cookie at all) the record lives for the default span.
    pub fn compute_expiry(&self, session: &SessionData, now: OffsetDateTime) -> i64 {
        match session.cookie_expires() {
            Some(expires) => epoch_millis(expires),
            None => self.default_expiry(now),
        }
    }

    /// `now` plus the default span, in epoch milliseconds.
    pub fn default_expiry(&self, now: OffsetDateTime) -> i64 {
        let span = i64::try_from(self.default_span.as_millis()).unwrap_or(i64::MAX);
        epoch_millis(now).saturating_add(span)
    }
}

/// Whether a stored record is still live at `now_ms`.
///
/// Records without an `expires` attribute never expire on read.
pub fn is_live(attributes: &Attributes, now_ms: i64) -> Result<bool, SerializationError> {
    match attributes.get(EXPIRES_ATTRIBUTE) {
        None => Ok(true),
        Some(raw) => {
            let expires: i64 = raw
                .parse()
                .map_err(|_| SerializationError::InvalidExpiry(raw.clone()))?;
            Ok(now_ms < expires)
        }
    }
}
