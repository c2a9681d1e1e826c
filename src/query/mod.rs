//! Query representation, parsing, compilation, and collection.
//!
//! - [`pquery`] - the serializable query tree every other layer speaks
//! - [`xml`] - the XML render target and tree-based query rebuilder
//! - [`parser`] - the extended string grammar and span promotion
//! - [`compiler`] - XPath AST to query translation with facts tracking
//! - [`collector`] - postings consumption with short-circuit termination

pub mod collector;
pub mod compiler;
pub mod parser;
pub mod pquery;
pub mod xml;

pub use collector::{CollectResult, Collector, Outcome, Termination};
pub use compiler::{CompiledQuery, Compiler, QueryFacts, Translation, ValueType};
pub use parser::parse_query;
pub use pquery::{Clause, Occur, ParseableQuery};
pub use xml::XmlNode;

use ahash::AHashMap;

/// Marker term field promoting a boolean group to an ordered span.
pub const WITHIN_MARKER: &str = "lux_within";

/// Marker term field promoting a boolean group to an unordered span.
pub const NEAR_MARKER: &str = "lux_near";

/// Namespace prefix bindings in scope while parsing or compiling a query.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: AHashMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `prefix` to `uri`, replacing any previous binding.
    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) -> &mut Self {
        self.map.insert(prefix.into(), uri.into());
        self
    }

    /// The URI bound to `prefix`, if any.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.map.get(prefix).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings() {
        let mut b = Bindings::new();
        b.bind("tei", "http://www.tei-c.org/ns/1.0");
        assert_eq!(b.resolve("tei"), Some("http://www.tei-c.org/ns/1.0"));
        assert_eq!(b.resolve("svg"), None);
    }
}
