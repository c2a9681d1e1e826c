//! Node kind definitions.
//!
//! `NodeKind` carries the payload for each node type. Navigation links
//! (parent, first child, next sibling) live on [`Node`](super::Node), not
//! here.

use super::qname::QName;

/// The kind of a document node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. Exactly one per `Document`, always at index 0.
    Document,

    /// An element node.
    Element {
        /// The element's qualified name.
        name: QName,
        /// Attributes in document order.
        attributes: Vec<Attribute>,
        /// Namespace declarations (`xmlns`/`xmlns:p`) on this element.
        namespaces: Vec<NamespaceDecl>,
    },

    /// A text node. Character references are already resolved.
    Text {
        content: String,
    },

    /// A comment node, without the `<!--` `-->` delimiters.
    Comment {
        content: String,
    },

    /// A processing instruction, e.g. `<?target data?>`.
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// A namespace declaration in scope on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// Declared prefix; empty for the default namespace.
    pub prefix: String,
    /// The bound URI.
    pub uri: String,
}

impl NamespaceDecl {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }
}
