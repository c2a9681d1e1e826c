//! In-memory document tree.
//!
//! Documents are stored as a flat arena of nodes in document (depth-first)
//! order. Navigation uses explicit indices, so the tree can be rebuilt from
//! a decoded buffer without back-patching private state: all construction
//! goes through [`DocumentBuilder`].

pub mod node;
pub mod qname;

pub use node::{Attribute, NamespaceDecl, NodeKind};
pub use qname::{QName, split_qname};

/// Index of a node within a [`Document`] arena.
pub type NodeId = u32;

/// A single node: payload plus navigation links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Depth from the document node (which is at depth 0).
    pub depth: u32,
}

/// An XML document held as a node arena.
///
/// Node 0 is always the document node; all other nodes appear in document
/// order, so iterating the arena is a depth-first traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// The document node's id.
    pub const ROOT: NodeId = 0;

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // A document always has at least its document node.
        self.nodes.len() <= 1
    }

    /// All node ids in document order.
    pub fn ids(&self) -> std::ops::Range<NodeId> {
        0..self.nodes.len() as NodeId
    }

    /// Children of `id`, in document order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Concatenated text content of the subtree rooted at `id`.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text { content } => out.push_str(content),
            NodeKind::Document | NodeKind::Element { .. } => {
                for child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
            NodeKind::Comment { .. } | NodeKind::ProcessingInstruction { .. } => {}
        }
    }

    /// Serialize back to XML text.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for child in self.children(Self::ROOT) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.node(id).kind {
            NodeKind::Document => {}
            NodeKind::Element {
                name,
                attributes,
                namespaces,
            } => {
                out.push('<');
                out.push_str(&name.as_written());
                for ns in namespaces {
                    if ns.prefix.is_empty() {
                        out.push_str(&format!(" xmlns=\"{}\"", escape_xml_attr(&ns.uri)));
                    } else {
                        out.push_str(&format!(
                            " xmlns:{}=\"{}\"",
                            ns.prefix,
                            escape_xml_attr(&ns.uri)
                        ));
                    }
                }
                for attr in attributes {
                    out.push_str(&format!(
                        " {}=\"{}\"",
                        attr.name.as_written(),
                        escape_xml_attr(&attr.value)
                    ));
                }
                if self.node(id).first_child.is_none() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for child in self.children(id) {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&name.as_written());
                out.push('>');
            }
            NodeKind::Text { content } => out.push_str(&escape_xml_text(content)),
            NodeKind::Comment { content } => {
                out.push_str("<!--");
                out.push_str(content);
                out.push_str("-->");
            }
            NodeKind::ProcessingInstruction { target, data } => {
                out.push_str("<?");
                out.push_str(target);
                if let Some(data) = data {
                    out.push(' ');
                    out.push_str(data);
                }
                out.push_str("?>");
            }
        }
    }

    /// Root-to-node path of element local names, e.g. `/play/title`.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            if let NodeKind::Element { name, .. } = &self.node(cur).kind {
                parts.push(name.local.clone());
            }
            current = self.node(cur).parent;
        }
        parts.reverse();
        let mut path = String::new();
        for part in parts {
            path.push('/');
            path.push_str(&part);
        }
        path
    }
}

fn escape_xml_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_xml_attr(s: &str) -> String {
    escape_xml_text(s).replace('"', "&quot;")
}

/// Iterator over a node's children.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc.node(id).next_sibling;
        Some(id)
    }
}

/// Event-style builder for [`Document`].
///
/// Elements are opened and closed like a SAX stream; text, comments and
/// processing instructions attach to the innermost open element (or the
/// document node). `build` panics if elements are still open; that is a
/// caller bug, not input data.
pub struct DocumentBuilder {
    nodes: Vec<Node>,
    /// Open element stack; the document node is always at the bottom.
    stack: Vec<NodeId>,
    /// Last child appended to each open node, for sibling linking.
    last_child: Vec<Option<NodeId>>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                first_child: None,
                next_sibling: None,
                depth: 0,
            }],
            stack: vec![Document::ROOT],
            last_child: vec![None],
        }
    }

    fn append(&mut self, kind: NodeKind) -> NodeId {
        let parent = *self.stack.last().expect("builder stack is never empty");
        let id = self.nodes.len() as NodeId;
        let depth = self.nodes[parent as usize].depth + 1;

        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            first_child: None,
            next_sibling: None,
            depth,
        });

        let slot = self.stack.len() - 1;
        match self.last_child[slot] {
            Some(prev) => self.nodes[prev as usize].next_sibling = Some(id),
            None => self.nodes[parent as usize].first_child = Some(id),
        }
        self.last_child[slot] = Some(id);
        id
    }

    /// Open an element with no attributes or namespace declarations.
    pub fn start_element(&mut self, name: QName) -> &mut Self {
        self.start_element_full(name, Vec::new(), Vec::new())
    }

    /// Open an element with attributes and namespace declarations.
    pub fn start_element_full(
        &mut self,
        name: QName,
        attributes: Vec<Attribute>,
        namespaces: Vec<NamespaceDecl>,
    ) -> &mut Self {
        let id = self.append(NodeKind::Element {
            name,
            attributes,
            namespaces,
        });
        self.stack.push(id);
        self.last_child.push(None);
        self
    }

    /// Close the innermost open element.
    pub fn end_element(&mut self) -> &mut Self {
        assert!(self.stack.len() > 1, "end_element with no open element");
        self.stack.pop();
        self.last_child.pop();
        self
    }

    pub fn text(&mut self, content: impl Into<String>) -> &mut Self {
        self.append(NodeKind::Text {
            content: content.into(),
        });
        self
    }

    pub fn comment(&mut self, content: impl Into<String>) -> &mut Self {
        self.append(NodeKind::Comment {
            content: content.into(),
        });
        self
    }

    pub fn processing_instruction(
        &mut self,
        target: impl Into<String>,
        data: Option<String>,
    ) -> &mut Self {
        self.append(NodeKind::ProcessingInstruction {
            target: target.into(),
            data,
        });
        self
    }

    /// Finish building. Panics if any element is still open.
    pub fn build(self) -> Document {
        assert!(
            self.stack.len() == 1,
            "build with {} unclosed element(s)",
            self.stack.len() - 1
        );
        Document { nodes: self.nodes }
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut b = DocumentBuilder::new();
        b.start_element(QName::local("play"));
        b.start_element(QName::local("title"));
        b.text("Hamlet");
        b.end_element();
        b.start_element_full(
            QName::local("act"),
            vec![Attribute::new(QName::local("n"), "1")],
            vec![],
        );
        b.text("Scene I");
        b.end_element();
        b.end_element();
        b.build()
    }

    #[test]
    fn test_document_order() {
        let doc = sample();
        assert_eq!(doc.len(), 6);
        assert!(matches!(doc.node(0).kind, NodeKind::Document));
        assert!(matches!(&doc.node(1).kind, NodeKind::Element { name, .. } if name.local == "play"));
        assert!(matches!(&doc.node(3).kind, NodeKind::Text { content } if content == "Hamlet"));
    }

    #[test]
    fn test_navigation() {
        let doc = sample();
        let play = 1;
        let children: Vec<_> = doc.children(play).collect();
        assert_eq!(children.len(), 2);
        assert_eq!(doc.node(children[0]).next_sibling, Some(children[1]));
        assert_eq!(doc.node(children[1]).parent, Some(play));
    }

    #[test]
    fn test_depths() {
        let doc = sample();
        assert_eq!(doc.node(0).depth, 0);
        assert_eq!(doc.node(1).depth, 1);
        assert_eq!(doc.node(3).depth, 3);
    }

    #[test]
    fn test_text_accumulation() {
        let doc = sample();
        assert_eq!(doc.text(Document::ROOT), "HamletScene I");
        assert_eq!(doc.text(2), "Hamlet");
    }

    #[test]
    fn test_path_of() {
        let doc = sample();
        assert_eq!(doc.path_of(2), "/play/title");
        assert_eq!(doc.path_of(3), "/play/title");
        assert_eq!(doc.path_of(0), "");
    }

    #[test]
    fn test_to_xml() {
        let mut b = DocumentBuilder::new();
        b.start_element_full(
            QName::new("play", "urn:drama", "d"),
            vec![Attribute::new(QName::local("genre"), "tragedy")],
            vec![NamespaceDecl::new("d", "urn:drama")],
        );
        b.start_element(QName::local("title"));
        b.text("R & J");
        b.end_element();
        b.start_element(QName::local("empty"));
        b.end_element();
        b.end_element();
        let doc = b.build();
        assert_eq!(
            doc.to_xml(),
            "<d:play xmlns:d=\"urn:drama\" genre=\"tragedy\"><title>R &amp; J</title><empty/></d:play>"
        );
    }

    #[test]
    #[should_panic(expected = "unclosed")]
    fn test_unbalanced_build_panics() {
        let mut b = DocumentBuilder::new();
        b.start_element(QName::local("open"));
        b.build();
    }
}
