//! Dynamically typed cache values
//!
//! A [`Value`] remembers the exact Rust type it was created from. Reading it
//! back as another type fails instead of coercing, both for values held in
//! process and for values decoded from a remote tier.

use serde::{Serialize, de::DeserializeOwned};
use std::{
    any::{Any, type_name},
    borrow::Cow,
    fmt,
    sync::Arc,
};

use crate::CacheError;

/// Trait for types that can be cached
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}
impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

type Encoder = fn(&(dyn Any + Send + Sync)) -> Result<Vec<u8>, CacheError>;

/// A stored value together with its runtime type tag
#[derive(Clone)]
pub struct Value {
    type_tag: Cow<'static, str>,
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    /// In-process object, shared between readers and never handed out by reference
    Live {
        object: Arc<dyn Any + Send + Sync>,
        encode: Encoder,
    },
    /// Value-only encoding, as decoded from a remote envelope
    Encoded(Arc<[u8]>),
}

impl Value {
    /// Wrap a typed value
    pub fn new<T: Cacheable>(value: T) -> Self {
        Self {
            type_tag: Cow::Borrowed(type_name::<T>()),
            repr: Repr::Live {
                object: Arc::new(value),
                encode: encode_any::<T>,
            },
        }
    }

    pub(crate) fn from_encoded(type_tag: String, bytes: Vec<u8>) -> Self {
        Self {
            type_tag: Cow::Owned(type_tag),
            repr: Repr::Encoded(bytes.into()),
        }
    }

    /// The type name recorded when the value was stored
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Whether the stored type is exactly `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.type_tag == type_name::<T>()
    }

    /// Copy the value out as `T`.
    ///
    /// Returns `None` when `T` is not exactly the stored type, or when an
    /// encoded value cannot be decoded.
    pub fn downcast<T: Cacheable>(&self) -> Option<T> {
        if !self.is::<T>() {
            return None;
        }
        match &self.repr {
            Repr::Live { object, .. } => object.downcast_ref::<T>().cloned(),
            Repr::Encoded(bytes) => decode_value(bytes).ok(),
        }
    }

    /// Encode only the value (no envelope), decodable with [`decode_value`]
    pub fn to_bytes(&self) -> Result<Vec<u8>, CacheError> {
        match &self.repr {
            Repr::Live { object, encode } => encode(object.as_ref()),
            Repr::Encoded(bytes) => Ok(bytes.to_vec()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self.repr {
            Repr::Live { .. } => "live",
            Repr::Encoded(_) => "encoded",
        };
        f.debug_struct("Value")
            .field("type_tag", &self.type_tag)
            .field("repr", &repr)
            .finish()
    }
}

/// Two values are equal when they have the same type and the same encoding.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.type_tag != other.type_tag {
            return false;
        }
        match (self.to_bytes(), other.to_bytes()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Encode a bare value in the same format [`Value::to_bytes`] produces
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode bytes returned by a `get_bytes` call
pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

fn encode_any<T: Cacheable>(object: &(dyn Any + Send + Sync)) -> Result<Vec<u8>, CacheError> {
    match object.downcast_ref::<T>() {
        Some(value) => encode_value(value),
        None => Err(CacheError::Backend(
            format!("stored object is not a {}", type_name::<T>()).into(),
        )),
    }
}
