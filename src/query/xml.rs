//! XML element tree rendering of queries.
//!
//! The XML form is the lossless render target: every variant, including
//! spans and namespaced node-text queries the string grammar cannot express
//! unambiguously, can be rebuilt from its element tree. Field attributes
//! are inheriting: a child omits `field` when it matches the nearest
//! ancestor's value (seeded by the caller's default field).

use std::fmt;

use crate::error::Error;
use crate::index::config::FieldType;
use crate::query::pquery::{flatten_span, Clause, Occur, ParseableQuery};

/// An element in the query XML tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

/// A child of an [`XmlNode`]: a nested element or character data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlChild {
    Node(XmlNode),
    Text(String),
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, node: XmlNode) -> Self {
        self.children.push(XmlChild::Node(node));
        self
    }

    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.children.push(XmlChild::Text(content.into()));
        self
    }

    /// The value of attribute `name`, if present.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated character data of direct children.
    pub fn content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let XmlChild::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    /// Direct element children.
    pub fn elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Node(n) => Some(n),
            XmlChild::Text(_) => None,
        })
    }
}

impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (name, value) in &self.attributes {
            write!(f, " {}=\"{}\"", name, escape_attr(value))?;
        }
        if self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for child in &self.children {
            match child {
                XmlChild::Node(node) => write!(f, "{node}")?,
                XmlChild::Text(text) => write!(f, "{}", escape_text(text))?,
            }
        }
        write!(f, "</{}>", self.name)
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

impl ParseableQuery {
    /// Render as an XML element tree, inheriting `default_field`.
    pub fn to_xml(&self, default_field: &str) -> Result<XmlNode, Error> {
        self.to_xml_inner(default_field, false)
    }

    fn to_xml_inner(&self, inherited: &str, in_span: bool) -> Result<XmlNode, Error> {
        match self {
            Self::MatchAll => Ok(XmlNode::new("MatchAllQuery")),
            Self::SpanMatchAll => Ok(XmlNode::new("SpanMatchAllQuery")),

            Self::Term { field, text, boost } => {
                let mut node = XmlNode::new("TermQuery");
                if field != inherited {
                    node = node.attr("field", field);
                }
                node = boost_attr(node, *boost);
                Ok(node.text(text))
            }

            Self::NodeText {
                field,
                qname,
                text,
                boost,
            } => {
                let mut node = XmlNode::new("QNameTextQuery").attr("qName", qname);
                if field != inherited {
                    node = node.attr("field", field);
                }
                node = boost_attr(node, *boost);
                Ok(node.text(text))
            }

            Self::Range {
                field,
                field_type,
                lower,
                upper,
                inclusive_lower,
                inclusive_upper,
            } => {
                let mut node = XmlNode::new("RangeQuery");
                if field != inherited {
                    node = node.attr("field", field);
                }
                node = node
                    .attr("type", field_type.as_str())
                    .attr("lowerInclusive", inclusive_lower.to_string())
                    .attr("upperInclusive", inclusive_upper.to_string());
                if let Some(lower) = lower {
                    node = node.child(XmlNode::new("Lower").text(lower));
                }
                if let Some(upper) = upper {
                    node = node.child(XmlNode::new("Upper").text(upper));
                }
                Ok(node)
            }

            Self::Boolean { clauses } => {
                let mut node = XmlNode::new("BooleanQuery");
                for clause in clauses {
                    if in_span && clause.occur == Occur::MustNot {
                        return Err(Error::SpanMustNot);
                    }
                    let child = clause.query.to_xml_inner(inherited, in_span)?;
                    node = node.child(
                        XmlNode::new("Clause")
                            .attr("occurs", clause.occur.as_str())
                            .child(child),
                    );
                }
                Ok(node)
            }

            Self::SpanNear {
                clauses,
                slop,
                in_order,
            } => {
                let mut node = XmlNode::new("SpanNearQuery")
                    .attr("slop", slop.to_string())
                    .attr("inOrder", in_order.to_string());
                for clause in flatten_span(clauses, *slop, *in_order) {
                    node = node.child(clause.to_xml_inner(inherited, true)?);
                }
                Ok(node)
            }

            Self::SpanBoolean { clauses, occur } => {
                if *occur == Occur::MustNot {
                    return Err(Error::SpanMustNot);
                }
                let name = match occur {
                    Occur::Should => "SpanOrQuery",
                    Occur::Must => "SpanBooleanQuery",
                    Occur::MustNot => unreachable!(),
                };
                let mut node = XmlNode::new(name);
                if *occur == Occur::Must {
                    node = node.attr("occurs", occur.as_str());
                }
                for clause in clauses {
                    node = node.child(clause.to_xml_inner(inherited, true)?);
                }
                Ok(node)
            }
        }
    }

    /// Rebuild a query from its XML element tree: the structured,
    /// tree-based query builder path.
    pub fn from_xml(node: &XmlNode, default_field: &str) -> Result<ParseableQuery, Error> {
        let field = node.get_attr("field").unwrap_or(default_field).to_string();
        match node.name.as_str() {
            "MatchAllQuery" => Ok(Self::MatchAll),
            "SpanMatchAllQuery" => Ok(Self::SpanMatchAll),

            "TermQuery" => Ok(Self::Term {
                field,
                text: node.content(),
                boost: parse_boost(node)?,
            }),

            "QNameTextQuery" => Ok(Self::NodeText {
                field,
                qname: node
                    .get_attr("qName")
                    .ok_or_else(|| Error::parse("QNameTextQuery without qName", 0))?
                    .to_string(),
                text: node.content(),
                boost: parse_boost(node)?,
            }),

            "RangeQuery" => {
                let type_attr = node
                    .get_attr("type")
                    .ok_or_else(|| Error::parse("RangeQuery without type", 0))?;
                let field_type = FieldType::parse(type_attr).ok_or_else(|| {
                    Error::parse(format!("unknown range type '{type_attr}'"), 0)
                })?;
                let bound = |name: &str| -> Option<String> {
                    node.elements()
                        .find(|e| e.name == name)
                        .map(|e| e.content())
                };
                Ok(Self::Range {
                    field,
                    field_type,
                    lower: bound("Lower"),
                    upper: bound("Upper"),
                    inclusive_lower: parse_flag(node, "lowerInclusive", true),
                    inclusive_upper: parse_flag(node, "upperInclusive", true),
                })
            }

            "BooleanQuery" => {
                let mut clauses = Vec::new();
                for clause_node in node.elements() {
                    if clause_node.name != "Clause" {
                        return Err(Error::parse(
                            format!("unexpected element '{}' in BooleanQuery", clause_node.name),
                            0,
                        ));
                    }
                    let occur = clause_node
                        .get_attr("occurs")
                        .and_then(Occur::parse)
                        .ok_or_else(|| Error::parse("Clause without valid occurs", 0))?;
                    let inner = clause_node
                        .elements()
                        .next()
                        .ok_or_else(|| Error::parse("empty Clause", 0))?;
                    clauses.push(Clause::new(Self::from_xml(inner, &field)?, occur));
                }
                Ok(Self::Boolean { clauses })
            }

            "SpanNearQuery" => {
                let slop = node
                    .get_attr("slop")
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| Error::parse("SpanNearQuery without valid slop", 0))?;
                let in_order = parse_flag(node, "inOrder", true);
                let clauses = node
                    .elements()
                    .map(|child| Self::from_xml(child, &field))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::SpanNear {
                    clauses,
                    slop,
                    in_order,
                })
            }

            "SpanOrQuery" | "SpanBooleanQuery" => {
                let occur = match node.name.as_str() {
                    "SpanOrQuery" => Occur::Should,
                    _ => node
                        .get_attr("occurs")
                        .and_then(Occur::parse)
                        .unwrap_or(Occur::Must),
                };
                if occur == Occur::MustNot {
                    return Err(Error::SpanMustNot);
                }
                let clauses = node
                    .elements()
                    .map(|child| Self::from_xml(child, &field))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::SpanBoolean { clauses, occur })
            }

            other => Err(Error::parse(format!("unknown query element '{other}'"), 0)),
        }
    }
}

fn boost_attr(node: XmlNode, boost: f32) -> XmlNode {
    if boost != 1.0 {
        node.attr("boost", boost.to_string())
    } else {
        node
    }
}

fn parse_boost(node: &XmlNode) -> Result<f32, Error> {
    match node.get_attr("boost") {
        None => Ok(1.0),
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::parse(format!("invalid boost '{raw}'"), 0)),
    }
}

fn parse_flag(node: &XmlNode, name: &str, default: bool) -> bool {
    node.get_attr(name)
        .map(|v| v == "true")
        .unwrap_or(default)
}
