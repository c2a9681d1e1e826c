//! The serializable query tree.
//!
//! `ParseableQuery` is the crate's lingua franca: the XPath compiler emits
//! it, the string grammar parses into it, and the index collaborator
//! consumes it. It is deliberately independent of any concrete search-engine
//! query object so it can be rendered both as a parser-grammar string and as
//! an XML element tree, and compared by value in tests.

use crate::error::Error;
use crate::index::config::FieldType;
use crate::query::{NEAR_MARKER, WITHIN_MARKER};

/// Occurrence of a clause in a boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

impl Occur {
    /// The grammar prefix: `+`, nothing, or `-`.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Must => "+",
            Self::Should => "",
            Self::MustNot => "-",
        }
    }

    /// The XML attribute value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Must => "must",
            Self::Should => "should",
            Self::MustNot => "mustNot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "must" => Some(Self::Must),
            "should" => Some(Self::Should),
            "mustNot" => Some(Self::MustNot),
            _ => None,
        }
    }
}

/// A boolean clause: a sub-query and how it must occur.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub query: ParseableQuery,
    pub occur: Occur,
}

impl Clause {
    pub fn new(query: ParseableQuery, occur: Occur) -> Self {
        Self { query, occur }
    }
}

/// An abstract search-engine query.
///
/// Clause order is significant everywhere: equality is order-sensitive and
/// renderers must not reorder.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseableQuery {
    /// Matches every document.
    MatchAll,

    /// Matches every position; the span-context counterpart of `MatchAll`.
    SpanMatchAll,

    /// A single term in a named field.
    Term {
        field: String,
        text: String,
        boost: f32,
    },

    /// A term scoped to an element or attribute qualified name: the index
    /// stores element/attribute text under terms prefixed with the QName.
    NodeText {
        field: String,
        qname: String,
        text: String,
        boost: f32,
    },

    /// A range over a typed field. Open bounds are `None`.
    Range {
        field: String,
        field_type: FieldType,
        lower: Option<String>,
        upper: Option<String>,
        inclusive_lower: bool,
        inclusive_upper: bool,
    },

    /// Ordered boolean combination.
    Boolean { clauses: Vec<Clause> },

    /// Positional proximity: clauses within `slop` positions, optionally in
    /// document order.
    SpanNear {
        clauses: Vec<ParseableQuery>,
        slop: u32,
        in_order: bool,
    },

    /// A boolean restricted to one uniform occurrence so it stays
    /// renderable inside a span context (`Should` is a span union).
    SpanBoolean {
        clauses: Vec<ParseableQuery>,
        occur: Occur,
    },
}

impl ParseableQuery {
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Term {
            field: field.into(),
            text: text.into(),
            boost: 1.0,
        }
    }

    pub fn node_text(
        field: impl Into<String>,
        qname: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::NodeText {
            field: field.into(),
            qname: qname.into(),
            text: text.into(),
            boost: 1.0,
        }
    }

    /// A MUST/SHOULD/MUST_NOT boolean over uniform clauses.
    pub fn boolean(occur: Occur, queries: Vec<ParseableQuery>) -> Self {
        Self::Boolean {
            clauses: queries
                .into_iter()
                .map(|q| Clause::new(q, occur))
                .collect(),
        }
    }

    /// An adjacency phrase: zero slop, in order.
    pub fn phrase(clauses: Vec<ParseableQuery>) -> Self {
        Self::SpanNear {
            clauses,
            slop: 0,
            in_order: true,
        }
    }

    pub fn with_boost(mut self, value: f32) -> Self {
        match &mut self {
            Self::Term { boost, .. } | Self::NodeText { boost, .. } => *boost = value,
            _ => {}
        }
        self
    }

    /// Render as a parser-grammar string.
    ///
    /// Terms in `default_field` drop their field prefix so the common case
    /// reads naturally. Fails only on span structures that the grammar
    /// cannot express (`MUST_NOT` in a span context).
    pub fn to_query_string(&self, default_field: &str) -> Result<String, Error> {
        self.render(default_field, false)
    }

    fn render(&self, default_field: &str, in_span: bool) -> Result<String, Error> {
        match self {
            Self::MatchAll | Self::SpanMatchAll => Ok("*:*".to_string()),

            Self::Term { field, text, boost } => {
                let mut out = String::new();
                if field != default_field {
                    out.push_str(field);
                    out.push(':');
                }
                out.push_str(&escape(text));
                push_boost(&mut out, *boost);
                Ok(out)
            }

            Self::NodeText {
                qname, text, boost, ..
            } => {
                let mut out = String::from("<");
                out.push_str(qname);
                out.push(':');
                out.push_str(&escape(text));
                push_boost(&mut out, *boost);
                Ok(out)
            }

            Self::Range {
                field,
                lower,
                upper,
                inclusive_lower,
                inclusive_upper,
                ..
            } => {
                let mut out = String::new();
                if field != default_field {
                    out.push_str(field);
                    out.push(':');
                }
                out.push(if *inclusive_lower { '[' } else { '{' });
                out.push_str(lower.as_deref().unwrap_or("*"));
                out.push_str(" TO ");
                out.push_str(upper.as_deref().unwrap_or("*"));
                out.push(if *inclusive_upper { ']' } else { '}' });
                Ok(out)
            }

            Self::Boolean { clauses } => {
                let mut parts = Vec::with_capacity(clauses.len());
                for clause in clauses {
                    if in_span && clause.occur == Occur::MustNot {
                        return Err(Error::SpanMustNot);
                    }
                    let sub = clause.query.render(default_field, in_span)?;
                    let wrapped = if needs_parens(&clause.query) {
                        format!("({sub})")
                    } else {
                        sub
                    };
                    parts.push(format!("{}{}", clause.occur.prefix(), wrapped));
                }
                Ok(parts.join(" "))
            }

            Self::SpanNear {
                clauses,
                slop,
                in_order,
            } => {
                let flat = flatten_span(clauses, *slop, *in_order);
                let marker = if *in_order { WITHIN_MARKER } else { NEAR_MARKER };
                let mut parts = Vec::with_capacity(flat.len() + 1);
                parts.push(format!("{}:{}", marker, slop + 1));
                for clause in &flat {
                    parts.push(clause.render(default_field, true)?);
                }
                Ok(format!("({})", parts.join(" ")))
            }

            Self::SpanBoolean { clauses, occur } => {
                if *occur == Occur::MustNot {
                    return Err(Error::SpanMustNot);
                }
                // MUST degenerates to ordinary boolean rendering; SHOULD
                // renders as a plain group the span promotion pass turns
                // back into a union.
                let degenerate = ParseableQuery::boolean(*occur, clauses.clone());
                degenerate.render(default_field, in_span)
            }
        }
    }
}

impl ParseableQuery {
    /// Render in the simplified surround grammar: prefix operators
    /// `and(..)`, `or(..)`, `not(..)`, and distance operators `Nw(..)`
    /// (ordered) / `Nn(..)` (unordered) where `N` is slop + 1. Leaf
    /// queries render as in the main grammar.
    pub fn to_surround_string(&self, default_field: &str) -> Result<String, Error> {
        match self {
            Self::Boolean { clauses } => {
                let mut musts = Vec::new();
                let mut shoulds = Vec::new();
                let mut nots = Vec::new();
                for clause in clauses {
                    let sub = clause.query.to_surround_string(default_field)?;
                    match clause.occur {
                        Occur::Must => musts.push(sub),
                        Occur::Should => shoulds.push(sub),
                        Occur::MustNot => nots.push(format!("not({sub})")),
                    }
                }

                let positive = match (musts.len(), shoulds.len()) {
                    (0, 0) => None,
                    (1, 0) => Some(musts.remove(0)),
                    (_, 0) => Some(format!("and({})", musts.join(", "))),
                    (0, 1) => Some(shoulds.remove(0)),
                    (0, _) => Some(format!("or({})", shoulds.join(", "))),
                    (_, _) => {
                        musts.push(format!("or({})", shoulds.join(", ")));
                        Some(format!("and({})", musts.join(", ")))
                    }
                };

                match positive {
                    Some(p) if nots.is_empty() => Ok(p),
                    Some(p) => {
                        let mut all = vec![p];
                        all.extend(nots);
                        Ok(format!("and({})", all.join(", ")))
                    }
                    None if nots.len() == 1 => Ok(nots.remove(0)),
                    None if !nots.is_empty() => Ok(format!("and({})", nots.join(", "))),
                    None => Ok("*:*".to_string()),
                }
            }

            Self::SpanNear {
                clauses,
                slop,
                in_order,
            } => {
                let flat = flatten_span(clauses, *slop, *in_order);
                let mut parts = Vec::with_capacity(flat.len());
                for clause in &flat {
                    parts.push(clause.to_surround_string(default_field)?);
                }
                let op = if *in_order { 'w' } else { 'n' };
                Ok(format!("{}{}({})", slop + 1, op, parts.join(", ")))
            }

            Self::SpanBoolean { clauses, occur } => {
                if *occur == Occur::MustNot {
                    return Err(Error::SpanMustNot);
                }
                let mut parts = Vec::with_capacity(clauses.len());
                for clause in clauses {
                    parts.push(clause.to_surround_string(default_field)?);
                }
                let op = if *occur == Occur::Must { "and" } else { "or" };
                Ok(format!("{op}({})", parts.join(", ")))
            }

            // Leaves coincide with the main grammar.
            other => other.to_query_string(default_field),
        }
    }
}

fn needs_parens(query: &ParseableQuery) -> bool {
    matches!(
        query,
        ParseableQuery::Boolean { .. } | ParseableQuery::SpanBoolean { .. }
    )
}

fn push_boost(out: &mut String, boost: f32) {
    if boost != 1.0 {
        out.push('^');
        out.push_str(&boost.to_string());
    }
}

/// Merge adjacent zero-slop in-order sub-spans into a flat clause list.
/// This is a rendering/size optimization only: adjacency inside an
/// adjacency phrase is the same constraint, so the leaf multiset and the
/// effective slop/order semantics are unchanged.
pub(crate) fn flatten_span(
    clauses: &[ParseableQuery],
    slop: u32,
    in_order: bool,
) -> Vec<ParseableQuery> {
    if slop != 0 || !in_order {
        return clauses.to_vec();
    }
    let mut flat = Vec::with_capacity(clauses.len());
    for clause in clauses {
        match clause {
            ParseableQuery::SpanNear {
                clauses: inner,
                slop: 0,
                in_order: true,
            } => flat.extend(flatten_span(inner, 0, true)),
            other => flat.push(other.clone()),
        }
    }
    flat
}

/// Escape text for the query grammar: anything with whitespace becomes a
/// quoted phrase; otherwise metacharacters are backslash-escaped. Repeated
/// application is a fixed point only for metacharacter-free input.
pub fn escape(text: &str) -> String {
    if text.is_empty() {
        return "\"\"".to_string();
    }
    if text.chars().any(char::is_whitespace) {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('"');
        for ch in text.chars() {
            if ch == '"' || ch == '\\' {
                out.push('\\');
            }
            out.push(ch);
        }
        out.push('"');
        out
    } else {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            if is_grammar_meta(ch) {
                out.push('\\');
            }
            out.push(ch);
        }
        out
    }
}

pub(crate) fn is_grammar_meta(ch: char) -> bool {
    matches!(
        ch,
        '+' | '-' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ':' | '^' | '\\' | '<' | '*'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_default_field() {
        let q = ParseableQuery::term("lux_text", "hamlet");
        assert_eq!(q.to_query_string("lux_text").unwrap(), "hamlet");
        assert_eq!(q.to_query_string("other").unwrap(), "lux_text:hamlet");
    }

    #[test]
    fn test_term_boost() {
        let q = ParseableQuery::term("lux_text", "hamlet").with_boost(2.0);
        assert_eq!(q.to_query_string("lux_text").unwrap(), "hamlet^2");
    }

    #[test]
    fn test_node_text_render() {
        let q = ParseableQuery::node_text("lux_elt_text", "title", "Hamlet");
        assert_eq!(q.to_query_string("lux_text").unwrap(), "<title:Hamlet");
    }

    #[test]
    fn test_boolean_must_render() {
        let q = ParseableQuery::boolean(
            Occur::Must,
            vec![
                ParseableQuery::term("lux_text", "big"),
                ParseableQuery::term("lux_text", "dog"),
            ],
        );
        assert_eq!(q.to_query_string("lux_text").unwrap(), "+big +dog");
    }

    #[test]
    fn test_boolean_mixed_render() {
        let q = ParseableQuery::Boolean {
            clauses: vec![
                Clause::new(ParseableQuery::term("lux_text", "cat"), Occur::Should),
                Clause::new(ParseableQuery::term("lux_text", "dog"), Occur::MustNot),
            ],
        };
        assert_eq!(q.to_query_string("lux_text").unwrap(), "cat -dog");
    }

    #[test]
    fn test_nested_boolean_parenthesized() {
        let inner = ParseableQuery::boolean(
            Occur::Should,
            vec![
                ParseableQuery::term("lux_text", "cat"),
                ParseableQuery::term("lux_text", "dog"),
            ],
        );
        let q = ParseableQuery::Boolean {
            clauses: vec![
                Clause::new(inner, Occur::Must),
                Clause::new(ParseableQuery::term("lux_text", "house"), Occur::Must),
            ],
        };
        assert_eq!(q.to_query_string("lux_text").unwrap(), "+(cat dog) +house");
    }

    #[test]
    fn test_range_render() {
        let q = ParseableQuery::Range {
            field: "year".to_string(),
            field_type: FieldType::Int,
            lower: Some("1600".to_string()),
            upper: None,
            inclusive_lower: true,
            inclusive_upper: false,
        };
        assert_eq!(q.to_query_string("lux_text").unwrap(), "year:[1600 TO *}");
    }

    #[test]
    fn test_span_near_render() {
        let q = ParseableQuery::phrase(vec![
            ParseableQuery::term("lux_text", "big"),
            ParseableQuery::term("lux_text", "dog"),
        ]);
        assert_eq!(
            q.to_query_string("lux_text").unwrap(),
            "(lux_within:1 big dog)"
        );
    }

    #[test]
    fn test_span_near_unordered_render() {
        let q = ParseableQuery::SpanNear {
            clauses: vec![
                ParseableQuery::term("lux_text", "big"),
                ParseableQuery::term("lux_text", "dog"),
            ],
            slop: 2,
            in_order: false,
        };
        assert_eq!(
            q.to_query_string("lux_text").unwrap(),
            "(lux_near:3 big dog)"
        );
    }

    #[test]
    fn test_span_flatten() {
        let inner = ParseableQuery::phrase(vec![
            ParseableQuery::term("lux_text", "or"),
            ParseableQuery::term("lux_text", "not"),
        ]);
        let q = ParseableQuery::phrase(vec![
            ParseableQuery::term("lux_text", "be"),
            inner,
            ParseableQuery::term("lux_text", "to"),
        ]);
        assert_eq!(
            q.to_query_string("lux_text").unwrap(),
            "(lux_within:1 be or not to)"
        );
    }

    #[test]
    fn test_span_flatten_preserves_leaves() {
        let inner = ParseableQuery::phrase(vec![
            ParseableQuery::term("f", "b"),
            ParseableQuery::term("f", "c"),
        ]);
        let clauses = vec![ParseableQuery::term("f", "a"), inner];
        let flat = flatten_span(&clauses, 0, true);
        assert_eq!(flat.len(), 3);
        // Sloppy spans must not be flattened into: nesting changes meaning.
        let sloppy = vec![
            ParseableQuery::term("f", "a"),
            ParseableQuery::phrase(vec![
                ParseableQuery::term("f", "b"),
                ParseableQuery::term("f", "c"),
            ]),
        ];
        assert_eq!(flatten_span(&sloppy, 2, true).len(), 2);
    }

    #[test]
    fn test_span_must_not_errors() {
        let q = ParseableQuery::SpanBoolean {
            clauses: vec![ParseableQuery::term("lux_text", "x")],
            occur: Occur::MustNot,
        };
        assert_eq!(q.to_query_string("lux_text"), Err(Error::SpanMustNot));
    }

    #[test]
    fn test_must_not_inside_span_errors() {
        let negated = ParseableQuery::Boolean {
            clauses: vec![Clause::new(
                ParseableQuery::term("lux_text", "x"),
                Occur::MustNot,
            )],
        };
        let q = ParseableQuery::SpanNear {
            clauses: vec![ParseableQuery::term("lux_text", "a"), negated],
            slop: 1,
            in_order: true,
        };
        assert_eq!(q.to_query_string("lux_text"), Err(Error::SpanMustNot));
    }

    #[test]
    fn test_span_boolean_must_degenerates() {
        let q = ParseableQuery::SpanBoolean {
            clauses: vec![
                ParseableQuery::term("lux_text", "big"),
                ParseableQuery::term("lux_text", "dog"),
            ],
            occur: Occur::Must,
        };
        assert_eq!(q.to_query_string("lux_text").unwrap(), "+big +dog");
    }

    #[test]
    fn test_surround_and() {
        let q = ParseableQuery::boolean(
            Occur::Must,
            vec![
                ParseableQuery::term("lux_text", "big"),
                ParseableQuery::term("lux_text", "dog"),
            ],
        );
        assert_eq!(q.to_surround_string("lux_text").unwrap(), "and(big, dog)");
    }

    #[test]
    fn test_surround_not() {
        let q = ParseableQuery::Boolean {
            clauses: vec![
                Clause::new(ParseableQuery::term("lux_text", "cat"), Occur::Should),
                Clause::new(ParseableQuery::term("lux_text", "dog"), Occur::MustNot),
            ],
        };
        assert_eq!(
            q.to_surround_string("lux_text").unwrap(),
            "and(cat, not(dog))"
        );
    }

    #[test]
    fn test_surround_span() {
        let q = ParseableQuery::phrase(vec![
            ParseableQuery::term("lux_text", "big"),
            ParseableQuery::term("lux_text", "dog"),
        ]);
        assert_eq!(q.to_surround_string("lux_text").unwrap(), "1w(big, dog)");

        let near = ParseableQuery::SpanNear {
            clauses: vec![
                ParseableQuery::term("lux_text", "big"),
                ParseableQuery::term("lux_text", "dog"),
            ],
            slop: 2,
            in_order: false,
        };
        assert_eq!(near.to_surround_string("lux_text").unwrap(), "3n(big, dog)");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("big dog"), "\"big dog\"");
        assert_eq!(escape("a:b"), "a\\:b");
        assert_eq!(escape("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(escape(""), "\"\"");
    }

    #[test]
    fn test_escape_idempotent_without_meta() {
        let s = "plainterm";
        assert_eq!(escape(&escape(s)), escape(s));
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let ab = ParseableQuery::boolean(
            Occur::Must,
            vec![
                ParseableQuery::term("f", "a"),
                ParseableQuery::term("f", "b"),
            ],
        );
        let ba = ParseableQuery::boolean(
            Occur::Must,
            vec![
                ParseableQuery::term("f", "b"),
                ParseableQuery::term("f", "a"),
            ],
        );
        assert_ne!(ab, ba);
        assert_eq!(ab, ab.clone());
    }

    #[test]
    fn test_equality_occur_sensitive() {
        let must = ParseableQuery::boolean(Occur::Must, vec![ParseableQuery::term("f", "a")]);
        let should = ParseableQuery::boolean(Occur::Should, vec![ParseableQuery::term("f", "a")]);
        assert_ne!(must, should);
    }
}
