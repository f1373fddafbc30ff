//! Hierarchical keys and their opaque string encoding.
//!
//! A key names one entity: a kind, a numeric id or string name, an optional
//! parent key, and a namespace. Parent pointers form a tree rooted at keys
//! without a parent.
//!
//! # Encoding
//!
//! Keys are encoded as URL-safe base64 (no padding) of a small JSON document
//! listing the path root-first:
//!
//! ```text
//! {"ns":"NeverLand","path":[{"kind":"Society","id":5066},{"kind":"Users","id":7}]}
//! ```
//!
//! The document carries a single namespace, the key's own. An ancestor built
//! in a different namespace comes back from decoding in the key's namespace;
//! the store refuses to persist such mixed keys in the first place.
//!
//! Decoding only checks that the string is structurally a key. Whether the
//! ancestors exist is the store's business.

use std::cmp::Ordering;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Maximum number of path elements in a decoded key.
pub const MAX_KEY_DEPTH: usize = 100;

/// Error produced when a string cannot be decoded into a key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The input is not a well-formed encoded key.
    #[error("malformed key: {0}")]
    Malformed(String),
}

impl KeyError {
    fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// The identifying part of a single path element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyId {
    /// No identifier yet; the store allocates a numeric id on put.
    Incomplete,
    /// A store-allocated or caller-chosen positive integer id.
    Id(i64),
    /// A caller-chosen string name.
    Name(String),
}

impl KeyId {
    /// Whether this element carries an identifier.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !matches!(self, Self::Incomplete)
    }
}

/// A key identifying one entity in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    kind: String,
    id: KeyId,
    parent: Option<Box<Key>>,
    namespace: String,
}

impl Key {
    /// Create a key from its parts.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        id: KeyId,
        parent: Option<Key>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            id,
            parent: parent.map(Box::new),
            namespace: namespace.into(),
        }
    }

    /// Create a key with a numeric id.
    #[must_use]
    pub fn id_key(
        kind: impl Into<String>,
        id: i64,
        parent: Option<Key>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::new(kind, KeyId::Id(id), parent, namespace)
    }

    /// Create a key with a string name.
    #[must_use]
    pub fn name_key(
        kind: impl Into<String>,
        name: impl Into<String>,
        parent: Option<Key>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::new(kind, KeyId::Name(name.into()), parent, namespace)
    }

    /// Create an incomplete key; the store assigns its id on put.
    #[must_use]
    pub fn incomplete(
        kind: impl Into<String>,
        parent: Option<Key>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::new(kind, KeyId::Incomplete, parent, namespace)
    }

    /// The entity kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The identifier of the last path element.
    #[must_use]
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// The parent key, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// The namespace this key lives in.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether this key and every ancestor carry an identifier.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.id.is_complete() && self.ancestors().all(|a| a.id.is_complete())
    }

    /// Return a copy of this key with its own identifier replaced.
    #[must_use]
    pub fn with_id(&self, id: KeyId) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }

    /// Iterate over the ancestors of this key, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Key> {
        std::iter::successors(self.parent(), |k| k.parent())
    }

    /// Whether `ancestor` appears somewhere on this key's parent chain.
    #[must_use]
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        self.ancestors().any(|a| a == ancestor)
    }

    /// Number of path elements, including this one.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.ancestors().count()
    }

    /// Path elements root-first.
    fn path(&self) -> Vec<&Key> {
        let mut path: Vec<&Key> = self.ancestors().collect();
        path.reverse();
        path.push(self);
        path
    }

    /// Encode this key as an opaque URL-safe string.
    ///
    /// The namespace of this key applies to the whole path, so ancestors in
    /// another namespace decode into this one. Incomplete keys can be encoded
    /// but will not decode.
    #[must_use]
    pub fn encode(&self) -> String {
        let document = KeyDocument {
            ns: self.namespace.clone(),
            path: self
                .path()
                .into_iter()
                .map(|k| {
                    let (id, name) = match &k.id {
                        KeyId::Incomplete => (None, None),
                        KeyId::Id(id) => (Some(*id), None),
                        KeyId::Name(name) => (None, Some(name.clone())),
                    };
                    PathElement {
                        kind: k.kind.clone(),
                        id,
                        name,
                    }
                })
                .collect(),
        };
        // Serializing a struct of strings and integers has no failure mode.
        let json = serde_json::to_vec(&document).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode an opaque key string produced by [`Key::encode`].
    pub fn decode(encoded: &str) -> Result<Self, KeyError> {
        if encoded.is_empty() {
            return Err(KeyError::malformed("empty key"));
        }

        let raw = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| KeyError::malformed(format!("invalid encoding: {e}")))?;
        let document: KeyDocument = serde_json::from_slice(&raw)
            .map_err(|e| KeyError::malformed(format!("invalid key document: {e}")))?;

        if document.path.is_empty() {
            return Err(KeyError::malformed("key path is empty"));
        }
        if document.path.len() > MAX_KEY_DEPTH {
            return Err(KeyError::malformed(format!(
                "key path exceeds {MAX_KEY_DEPTH} elements"
            )));
        }

        let mut key: Option<Key> = None;
        for element in document.path {
            if element.kind.is_empty() {
                return Err(KeyError::malformed("empty kind in key path"));
            }
            let id = match (element.id, element.name) {
                (Some(id), None) if id > 0 => KeyId::Id(id),
                (Some(id), None) => {
                    return Err(KeyError::malformed(format!(
                        "non-positive id {id} for kind {}",
                        element.kind
                    )));
                }
                (None, Some(name)) if !name.is_empty() => KeyId::Name(name),
                (None, Some(_)) => {
                    return Err(KeyError::malformed(format!(
                        "empty name for kind {}",
                        element.kind
                    )));
                }
                (None, None) => {
                    return Err(KeyError::malformed(format!(
                        "incomplete path element for kind {}",
                        element.kind
                    )));
                }
                (Some(_), Some(_)) => {
                    return Err(KeyError::malformed(format!(
                        "path element for kind {} has both id and name",
                        element.kind
                    )));
                }
            };
            key = Some(Key::new(element.kind, id, key, document.ns.clone()));
        }

        key.ok_or_else(|| KeyError::malformed("key path is empty"))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    /// Keys order by namespace, then path root-first, comparing kind and
    /// then identifier at each level. A key sorts right after its ancestors.
    fn cmp(&self, other: &Self) -> Ordering {
        self.namespace.cmp(&other.namespace).then_with(|| {
            let (a, b) = (self.path(), other.path());
            for (x, y) in a.iter().zip(b.iter()) {
                let ord = x.kind.cmp(&y.kind).then_with(|| x.id.cmp(&y.id));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for k in self.path() {
            match &k.id {
                KeyId::Incomplete => write!(f, "/{},incomplete", k.kind)?,
                KeyId::Id(id) => write!(f, "/{},{id}", k.kind)?,
                KeyId::Name(name) => write!(f, "/{},{name:?}", k.kind)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    ns: String,
    path: Vec<PathElement>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathElement {
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}
