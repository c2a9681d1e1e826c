//! Qualified names.
//!
//! A `QName` pairs a local name with a namespace URI and an optional prefix.
//! The namespace URI plus the local name is the semantic identity; the
//! prefix is presentation only and is carried best-effort. The stable string
//! encoding (`local` or `local{uri}`) is used both as index term prefixes
//! and as dictionary keys in the binary tree codec.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A qualified XML name.
#[derive(Debug, Clone, Default)]
pub struct QName {
    /// Local part, e.g. `title` in `tei:title`.
    pub local: String,
    /// Namespace URI the name is bound to; empty for no namespace.
    pub namespace_uri: String,
    /// Prefix as written in the source document; empty for none.
    /// Not part of the name's identity.
    pub prefix: String,
}

impl QName {
    /// A name in no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            namespace_uri: String::new(),
            prefix: String::new(),
        }
    }

    /// A namespaced name.
    pub fn new(
        local: impl Into<String>,
        namespace_uri: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            local: local.into(),
            namespace_uri: namespace_uri.into(),
            prefix: prefix.into(),
        }
    }

    /// Stable encoding: `local` for names in no namespace, `local{uri}`
    /// otherwise. Reversible up to the prefix.
    pub fn encoded(&self) -> String {
        if self.namespace_uri.is_empty() {
            self.local.clone()
        } else {
            format!("{}{{{}}}", self.local, self.namespace_uri)
        }
    }

    /// Inverse of [`encoded`](Self::encoded). The prefix cannot be
    /// recovered and comes back empty.
    pub fn from_encoded(encoded: &str) -> Self {
        match encoded.find('{') {
            Some(pos) if encoded.ends_with('}') => Self {
                local: encoded[..pos].to_string(),
                namespace_uri: encoded[pos + 1..encoded.len() - 1].to_string(),
                prefix: String::new(),
            },
            _ => Self::local(encoded),
        }
    }

    /// The name as written: `prefix:local` or bare `local`.
    pub fn as_written(&self) -> String {
        if self.prefix.is_empty() {
            self.local.clone()
        } else {
            format!("{}:{}", self.prefix, self.local)
        }
    }
}

/// Splits a lexical QName into prefix and local parts.
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.namespace_uri == other.namespace_uri
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.local.hash(state);
        self.namespace_uri.hash(state);
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded())
    }
}
