//! Cache item envelope
//!
//! An [`Item`] pairs a value with its creation and expiry timestamps. Items are
//! built fresh for every write and never modified once stored.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{CacheError, Value};

/// Expiry sentinel for items that never expire
pub const NEVER_EXPIRES: i64 = i64::MAX;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Value plus lifecycle metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Unix nanoseconds at creation
    pub created_at: i64,
    /// Unix nanoseconds at expiry, [`NEVER_EXPIRES`] when unbounded
    pub expired_at: i64,
    /// `None` is the nil value
    pub value: Option<Value>,
}

/// On-the-wire envelope. The value is stored as its own value-only encoding
/// so `get_bytes` can hand it out without re-encoding the envelope.
#[derive(Serialize, Deserialize)]
struct WireItem {
    created_at: i64,
    expired_at: i64,
    value: Option<WireValue>,
}

#[derive(Serialize, Deserialize)]
struct WireValue {
    type_tag: String,
    bytes: Vec<u8>,
}

impl Item {
    /// Fresh item: created now, never expires, nil value
    pub fn new() -> Self {
        Self {
            created_at: now_nanos(),
            expired_at: NEVER_EXPIRES,
            value: None,
        }
    }

    /// Fresh item holding `value` and expiring `ttl_ms` after creation
    pub fn with_value(value: Value, ttl_ms: u64) -> Self {
        let mut item = Self::new();
        item.set_expire(ttl_ms);
        item.value = Some(value);
        item
    }

    /// Derive `expired_at` from `created_at`. A zero TTL leaves the item unbounded.
    pub fn set_expire(&mut self, ttl_ms: u64) {
        if ttl_ms == 0 {
            return;
        }
        let ttl_nanos = i64::try_from(ttl_ms)
            .unwrap_or(i64::MAX)
            .saturating_mul(NANOS_PER_MILLI);
        self.expired_at = self.created_at.saturating_add(ttl_nanos);
    }

    pub fn is_valid(&self, now: i64) -> bool {
        self.expired_at > now
    }

    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        let value = match &self.value {
            Some(value) => Some(WireValue {
                type_tag: value.type_tag().to_owned(),
                bytes: value.to_bytes()?,
            }),
            None => None,
        };
        let wire = WireItem {
            created_at: self.created_at,
            expired_at: self.expired_at,
            value,
        };
        Ok(rmp_serde::to_vec_named(&wire)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        let wire: WireItem = rmp_serde::from_slice(bytes)?;
        Ok(Self {
            created_at: wire.created_at,
            expired_at: wire.expired_at,
            value: wire
                .value
                .map(|v| Value::from_encoded(v.type_tag, v.bytes)),
        })
    }
}

impl Default for Item {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall clock time in unix nanoseconds
pub(crate) fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
