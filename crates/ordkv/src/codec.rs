//! Value encoding.
//!
//! Values pass through two stages on their way to the store. The typed
//! stage serializes them to JSON with `serde_json`. The [`CodecHooks`] stage
//! then transforms the JSON bytes, for example to compress them. Reads apply
//! the inverse stages in reverse order.

use crate::{AccessorError, AccessorResult};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

/// Byte-level encode and decode hooks, applied after serialization and
/// before deserialization respectively.
///
/// Hooks must not touch the accessor they are installed on. Returning `None`
/// from [`encode`](Self::encode) fails the write. Returning `None` from
/// [`decode`](Self::decode) makes the value read as absent.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait CodecHooks: Send + Sync {
    /// Transform serialized bytes before they are stored under `key`.
    fn encode(&self, key: &str, bytes: Bytes) -> Option<Bytes>;

    /// Transform stored bytes before they are deserialized.
    fn decode(&self, key: &str, bytes: Bytes) -> Option<Bytes>;
}

/// Hooks that pass bytes through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityHooks;

impl CodecHooks for IdentityHooks {
    fn encode(&self, _key: &str, bytes: Bytes) -> Option<Bytes> {
        Some(bytes)
    }

    fn decode(&self, _key: &str, bytes: Bytes) -> Option<Bytes> {
        Some(bytes)
    }
}

/// Hooks built from a pair of closures.
///
/// ```
/// use bytes::Bytes;
/// use ordkv::{CodecHooks, FnHooks};
///
/// let rot = FnHooks::new(
///     |_key: &str, b: Bytes| Some(b.iter().map(|x| x.wrapping_add(1)).collect()),
///     |_key: &str, b: Bytes| Some(b.iter().map(|x| x.wrapping_sub(1)).collect()),
/// );
/// let stored = rot.encode("k", Bytes::from_static(b"abc")).unwrap();
/// assert_eq!(stored.as_ref(), b"bcd");
/// ```
#[derive(Clone, Copy)]
pub struct FnHooks<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> core::fmt::Debug for FnHooks<E, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnHooks").finish_non_exhaustive()
    }
}

impl<E, D> FnHooks<E, D> {
    /// Create hooks from an encode and a decode closure.
    pub const fn new(encode: E, decode: D) -> Self
    where
        E: Fn(&str, Bytes) -> Option<Bytes> + Send + Sync,
        D: Fn(&str, Bytes) -> Option<Bytes> + Send + Sync,
    {
        Self { encode, decode }
    }
}

impl<E, D> CodecHooks for FnHooks<E, D>
where
    E: Fn(&str, Bytes) -> Option<Bytes> + Send + Sync,
    D: Fn(&str, Bytes) -> Option<Bytes> + Send + Sync,
{
    fn encode(&self, key: &str, bytes: Bytes) -> Option<Bytes> {
        (self.encode)(key, bytes)
    }

    fn decode(&self, key: &str, bytes: Bytes) -> Option<Bytes> {
        (self.decode)(key, bytes)
    }
}

/// Serialize `value` and run it through the encode hook.
pub(crate) fn encode_value<T>(hooks: &dyn CodecHooks, key: &str, value: &T) -> AccessorResult<Bytes>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_vec(value)
        .map_err(|source| AccessorError::Encode { key: key.to_owned(), source })?;
    hooks.encode(key, Bytes::from(json)).ok_or_else(|| AccessorError::HookRejected(key.to_owned()))
}

/// Run stored bytes through the decode hook and deserialize them.
///
/// Any failure yields `None`.
pub(crate) fn decode_value<T: DeserializeOwned>(
    hooks: &dyn CodecHooks,
    key: &str,
    raw: &[u8],
) -> Option<T> {
    let Some(bytes) = hooks.decode(key, Bytes::copy_from_slice(raw)) else {
        tracing::debug!(target: "ordkv::codec", key, "decode hook rejected value");
        return None;
    };
    serde_json::from_slice(&bytes)
        .inspect_err(|err| tracing::debug!(target: "ordkv::codec", key, %err, "undecodable value"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    fn reversing() -> FnHooks<
        impl Fn(&str, Bytes) -> Option<Bytes> + Send + Sync,
        impl Fn(&str, Bytes) -> Option<Bytes> + Send + Sync,
    > {
        let reverse = |_: &str, b: Bytes| Some(b.iter().rev().copied().collect::<Vec<_>>().into());
        FnHooks::new(reverse, reverse)
    }

    #[test]
    fn identity_round_trip() {
        let raw = encode_value(&IdentityHooks, "p", &Point { x: 1, y: -2 }).unwrap();
        assert_eq!(raw.as_ref(), br#"{"x":1,"y":-2}"#);
        assert_eq!(decode_value::<Point>(&IdentityHooks, "p", &raw), Some(Point { x: 1, y: -2 }));
    }

    #[test]
    fn hooks_apply_after_serialization() {
        let hooks: Arc<dyn CodecHooks> = Arc::new(reversing());
        let raw = encode_value(hooks.as_ref(), "n", &123u32).unwrap();
        assert_eq!(raw.as_ref(), b"321");
        assert_eq!(decode_value::<u32>(hooks.as_ref(), "n", &raw), Some(123));
    }

    #[test]
    fn rejected_encode_is_an_error() {
        let hooks = FnHooks::new(|_: &str, _| None, |_: &str, b| Some(b));
        let err = encode_value(&hooks, "k", "v").unwrap_err();
        assert!(matches!(err, AccessorError::HookRejected(key) if key == "k"));
    }

    #[test]
    fn decode_failures_are_absent() {
        assert_eq!(decode_value::<Point>(&IdentityHooks, "p", b"not json"), None);
        assert_eq!(decode_value::<Point>(&IdentityHooks, "p", br#"{"x":1}"#), None);

        let refusing = FnHooks::new(|_: &str, b| Some(b), |_: &str, _| None);
        assert_eq!(decode_value::<u32>(&refusing, "n", b"1"), None);
    }
}
