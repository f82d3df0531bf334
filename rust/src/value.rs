//! Dynamically typed value tree
//!
//! `ValueTree` is the in-memory model the encoder walks. It mirrors the
//! MessagePack data model closely enough that every variant has exactly one
//! codec primitive, but keeps signed and unsigned integers apart so callers
//! can say which encoding path they want exercised.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// One node of a value tree
///
/// Composite nodes own their children. Map keys are expected to be `Str`;
/// the key slot is a full node so that a malformed tree can still be built
/// and rejected by the encoder instead of being unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueTree {
    Bool(bool),
    Nil,
    Int(i64),
    UInt(u64),
    Double(f64),
    /// Length-carrying byte string, not required to be UTF-8
    Str(Vec<u8>),
    Array(Vec<ValueTree>),
    Map(Vec<(ValueTree, ValueTree)>),
}

impl ValueTree {
    /// Build a `Str` node from anything byte-like
    #[inline]
    pub fn str(bytes: impl AsRef<[u8]>) -> Self {
        ValueTree::Str(bytes.as_ref().to_vec())
    }

    #[inline]
    pub fn array(items: impl IntoIterator<Item = ValueTree>) -> Self {
        ValueTree::Array(items.into_iter().collect())
    }

    /// Build a `Map` with string keys, preserving iteration order
    pub fn map<K: AsRef<[u8]>>(entries: impl IntoIterator<Item = (K, ValueTree)>) -> Self {
        ValueTree::Map(
            entries
                .into_iter()
                .map(|(k, v)| (ValueTree::str(k), v))
                .collect(),
        )
    }

    /// Static variant name, used in error messages and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ValueTree::Bool(_) => "bool",
            ValueTree::Nil => "nil",
            ValueTree::Int(_) => "int",
            ValueTree::UInt(_) => "uint",
            ValueTree::Double(_) => "double",
            ValueTree::Str(_) => "str",
            ValueTree::Array(_) => "array",
            ValueTree::Map(_) => "map",
        }
    }

    pub fn is_str(&self) -> bool {
        matches!(self, ValueTree::Str(_))
    }

    /// Number of nodes in the tree, map keys included
    ///
    /// Walks with an explicit stack, so arbitrarily deep trees are safe.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            match node {
                ValueTree::Array(items) => pending.extend(items),
                ValueTree::Map(entries) => {
                    for (k, v) in entries {
                        pending.push(k);
                        pending.push(v);
                    }
                }
                _ => {}
            }
        }
        count
    }

    /// Nesting depth: 0 for scalars and empty containers, otherwise one more
    /// than the deepest child. Map keys count as children.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 0usize)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            match node {
                ValueTree::Array(items) => pending.extend(items.iter().map(|c| (c, level + 1))),
                ValueTree::Map(entries) => {
                    for (k, v) in entries {
                        pending.push((k, level + 1));
                        pending.push((v, level + 1));
                    }
                }
                _ => {}
            }
        }
        deepest
    }

    /// Fold every `UInt` that fits in `i64` into `Int`.
    ///
    /// MessagePack has a single integer family, so a decoder cannot tell
    /// `UInt(5)` from `Int(5)`. Comparing `decode(encode(t))` against
    /// `t.canonical()` is the round-trip property. Recurses once per nesting
    /// level, the same as dropping the tree.
    pub fn canonical(self) -> Self {
        match self {
            ValueTree::UInt(n) if n <= i64::MAX as u64 => ValueTree::Int(n as i64),
            ValueTree::Array(items) => {
                ValueTree::Array(items.into_iter().map(ValueTree::canonical).collect())
            }
            ValueTree::Map(entries) => ValueTree::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.canonical(), v.canonical()))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl From<bool> for ValueTree {
    fn from(v: bool) -> Self {
        ValueTree::Bool(v)
    }
}

impl From<i64> for ValueTree {
    fn from(v: i64) -> Self {
        ValueTree::Int(v)
    }
}

impl From<u64> for ValueTree {
    fn from(v: u64) -> Self {
        ValueTree::UInt(v)
    }
}

impl From<f64> for ValueTree {
    fn from(v: f64) -> Self {
        ValueTree::Double(v)
    }
}

impl From<&str> for ValueTree {
    fn from(v: &str) -> Self {
        ValueTree::str(v)
    }
}

impl From<String> for ValueTree {
    fn from(v: String) -> Self {
        ValueTree::Str(v.into_bytes())
    }
}

// ==================== Serde Support ====================

impl Serialize for ValueTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValueTree::Bool(v) => serializer.serialize_bool(*v),
            ValueTree::Nil => serializer.serialize_unit(),
            ValueTree::Int(v) => serializer.serialize_i64(*v),
            ValueTree::UInt(v) => serializer.serialize_u64(*v),
            ValueTree::Double(v) => serializer.serialize_f64(*v),
            ValueTree::Str(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => serializer.serialize_str(s),
                Err(_) => serializer.serialize_bytes(bytes),
            },
            ValueTree::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ValueTree::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

struct ValueTreeVisitor;

impl<'de> Visitor<'de> for ValueTreeVisitor {
    type Value = ValueTree;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a nil, bool, number, string, array or string-keyed map")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ValueTree, E> {
        Ok(ValueTree::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ValueTree, E> {
        Ok(ValueTree::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ValueTree, E> {
        match i64::try_from(v) {
            Ok(i) => Ok(ValueTree::Int(i)),
            Err(_) => Ok(ValueTree::UInt(v)),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ValueTree, E> {
        Ok(ValueTree::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ValueTree, E> {
        Ok(ValueTree::str(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ValueTree, E> {
        Ok(ValueTree::Str(v.into_bytes()))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<ValueTree, E> {
        Ok(ValueTree::str(v))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<ValueTree, E> {
        Ok(ValueTree::Str(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ValueTree, E> {
        Ok(ValueTree::Nil)
    }

    fn visit_none<E: de::Error>(self) -> Result<ValueTree, E> {
        Ok(ValueTree::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<ValueTree, D::Error> {
        ValueTree::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ValueTree, A::Error> {
        // size_hint comes from untrusted input
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(ValueTree::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ValueTree, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0).min(4096));
        while let Some(key) = map.next_key::<ValueTree>()? {
            if !key.is_str() {
                return Err(de::Error::custom(format_args!(
                    "map key at index {} must be a string, found {}",
                    entries.len(),
                    key.kind()
                )));
            }
            let value = map.next_value()?;
            entries.push((key, value));
        }
        Ok(ValueTree::Map(entries))
    }
}

impl<'de> Deserialize<'de> for ValueTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueTreeVisitor)
    }
}
