//! The extended query string grammar.
//!
//! On top of the usual boolean/phrase grammar (`+`/`-` occurs, quoted
//! phrases, `field:term`, ranges, boosts, groups) this recognizes the
//! node-scoped term syntax `[node]<[qName]:[term]`:
//!
//! - empty qName (`<:dog`) searches the whole-document text field
//! - a local name (`<title:dog`) searches the element text field
//! - `@name` (`<@id:x7`) searches the attribute text field
//! - a prefixed name (`<tei:title:dog`) resolves the prefix against the
//!   caller's namespace bindings
//!
//! Term text goes through the analyzer configured for the target field, so
//! multi-token input becomes a phrase scoped to the qName. After parsing, a
//! rewrite pass promotes boolean groups led by a `lux_within:N` /
//! `lux_near:N` marker term into ordered/unordered span queries.

use crate::error::Error;
use crate::index::config::{FieldType, IndexConfig};
use crate::query::pquery::{Clause, Occur, ParseableQuery};
use crate::query::{Bindings, NEAR_MARKER, WITHIN_MARKER};
use crate::tree::qname::{split_qname, QName};
use crate::utils::analyzer::analyze;

/// Parse a query string against the given configuration and namespace
/// bindings. Terms without a field prefix search `default_field`.
pub fn parse_query(
    input: &str,
    config: &IndexConfig,
    bindings: &Bindings,
    default_field: &str,
) -> Result<ParseableQuery, Error> {
    let mut parser = QueryParser {
        input,
        pos: 0,
        config,
        bindings,
        default_field,
    };
    let raw = parser.parse()?;
    promote_spans(raw)
}

struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
    config: &'a IndexConfig,
    bindings: &'a Bindings,
    default_field: &'a str,
}

impl<'a> QueryParser<'a> {
    fn parse(&mut self) -> Result<ParseableQuery, Error> {
        let query = self.parse_boolean()?;
        self.skip_whitespace();
        if !self.is_eof() {
            return Err(Error::parse(
                format!("unexpected '{}'", self.peek_char().unwrap()),
                self.pos,
            ));
        }
        Ok(query)
    }

    fn parse_boolean(&mut self) -> Result<ParseableQuery, Error> {
        let mut clauses = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_eof() || self.peek_char() == Some(')') {
                break;
            }

            let occur = if self.consume_char('+') {
                Occur::Must
            } else if self.consume_char('-') {
                Occur::MustNot
            } else {
                Occur::Should
            };

            let query = self.parse_primary()?;
            clauses.push(Clause::new(query, occur));
        }

        match clauses.len() {
            0 => Err(Error::parse("empty query", self.pos)),
            1 if clauses[0].occur == Occur::Should => Ok(clauses.remove(0).query),
            _ => Ok(ParseableQuery::Boolean { clauses }),
        }
    }

    fn parse_primary(&mut self) -> Result<ParseableQuery, Error> {
        self.skip_whitespace();

        if self.remaining().starts_with("*:*") {
            self.pos += 3;
            return Ok(ParseableQuery::MatchAll);
        }

        if self.consume_char('(') {
            let inner = self.parse_boolean()?;
            if !self.consume_char(')') {
                return Err(Error::parse("expected ')'", self.pos));
            }
            return Ok(inner);
        }

        if self.peek_char() == Some('"') {
            let text = self.read_quoted()?;
            return self.field_phrase(self.default_field.to_string(), &text);
        }

        if self.consume_char('<') {
            return self.parse_node_scoped(String::new());
        }

        if matches!(self.peek_char(), Some('[') | Some('{')) {
            return self.parse_range(self.default_field.to_string());
        }

        let word = self.read_word()?;
        if word.is_empty() {
            return Err(Error::parse("expected a term", self.pos));
        }

        if self.consume_char('<') {
            return self.parse_node_scoped(word);
        }

        if self.consume_char(':') {
            return self.parse_field(word);
        }

        let boost = self.parse_boost()?;
        Ok(ParseableQuery::term(self.default_field, word).with_boost(boost))
    }

    /// `field:` has been consumed; parse what the field applies to.
    fn parse_field(&mut self, field: String) -> Result<ParseableQuery, Error> {
        if matches!(self.peek_char(), Some('[') | Some('{')) {
            return self.parse_range(field);
        }
        if self.peek_char() == Some('"') {
            let text = self.read_quoted()?;
            return self.field_phrase(field, &text);
        }
        let text = self.read_word()?;
        if text.is_empty() {
            return Err(Error::parse(format!("missing term after '{field}:'"), self.pos));
        }
        let boost = self.parse_boost()?;
        Ok(ParseableQuery::term(field, text).with_boost(boost))
    }

    /// Quoted text on a plain field: analyze and phrase if multi-token.
    fn field_phrase(&mut self, field: String, text: &str) -> Result<ParseableQuery, Error> {
        let boost = self.parse_boost()?;
        let tokens = analyze(text);
        match tokens.len() {
            0 => Err(Error::parse("phrase has no indexable tokens", self.pos)),
            1 => Ok(ParseableQuery::term(field, tokens.into_iter().next().unwrap())
                .with_boost(boost)),
            _ => Ok(ParseableQuery::phrase(
                tokens
                    .into_iter()
                    .map(|t| ParseableQuery::term(field.clone(), t).with_boost(boost))
                    .collect(),
            )),
        }
    }

    /// `node<` has been consumed; parse `[qName]:[term]`.
    fn parse_node_scoped(&mut self, node_part: String) -> Result<ParseableQuery, Error> {
        let first = self.read_name();
        if !self.consume_char(':') {
            return Err(Error::parse("expected ':' after qName", self.pos));
        }

        // A prefixed qName has a second name segment followed by another
        // colon; term-text colons are always escaped, so an unescaped colon
        // here belongs to the qName.
        let checkpoint = self.pos;
        let second = self.read_name();
        let written = if !second.is_empty() && self.consume_char(':') {
            format!("{first}:{second}")
        } else {
            self.pos = checkpoint;
            first
        };

        let fields = &self.config.fields;
        let (field, qname) = if let Some(att) = written.strip_prefix('@') {
            let resolved = self.resolve_name(att)?;
            let field = if node_part.is_empty() {
                fields.att_text_field.clone()
            } else {
                node_part
            };
            (field, format!("@{resolved}"))
        } else if written.is_empty() {
            let field = if node_part.is_empty() {
                fields.text_field.clone()
            } else {
                node_part
            };
            (field, String::new())
        } else {
            let resolved = self.resolve_name(&written)?;
            let field = if node_part.is_empty() {
                fields.elt_text_field.clone()
            } else {
                node_part
            };
            (field, resolved)
        };

        let text = if self.peek_char() == Some('"') {
            self.read_quoted()?
        } else {
            self.read_word()?
        };
        if text.is_empty() {
            return Err(Error::parse("missing term after qName", self.pos));
        }
        let boost = self.parse_boost()?;

        let tokens = analyze(&text);
        match tokens.len() {
            0 => Err(Error::parse("term has no indexable tokens", self.pos)),
            1 => Ok(
                ParseableQuery::node_text(field, qname, tokens.into_iter().next().unwrap())
                    .with_boost(boost),
            ),
            _ => Ok(ParseableQuery::phrase(
                tokens
                    .into_iter()
                    .map(|t| {
                        ParseableQuery::node_text(field.clone(), qname.clone(), t)
                            .with_boost(boost)
                    })
                    .collect(),
            )),
        }
    }

    /// Resolve a possibly prefixed name against the bindings in scope.
    fn resolve_name(&self, written: &str) -> Result<String, Error> {
        // Already in `local{uri}` form: no prefix to resolve.
        if written.contains('{') {
            return Ok(written.to_string());
        }
        match split_qname(written) {
            (None, local) => Ok(local.to_string()),
            (Some(prefix), local) => match self.bindings.resolve(prefix) {
                Some(uri) => Ok(QName::new(local, uri, prefix).encoded()),
                None if self.config.namespace_aware => {
                    Err(Error::UnboundPrefix(prefix.to_string()))
                }
                // Relaxed mode keeps the name as written.
                None => Ok(written.to_string()),
            },
        }
    }

    fn parse_range(&mut self, field: String) -> Result<ParseableQuery, Error> {
        let inclusive_lower = match self.peek_char() {
            Some('[') => true,
            Some('{') => false,
            _ => return Err(Error::parse("expected '[' or '{'", self.pos)),
        };
        self.advance();

        let lower = self.read_bound()?;
        self.skip_whitespace();
        if !self.remaining().starts_with("TO") {
            return Err(Error::parse("expected 'TO' in range", self.pos));
        }
        self.pos += 2;
        self.skip_whitespace();
        let upper = self.read_bound()?;

        let inclusive_upper = match self.peek_char() {
            Some(']') => true,
            Some('}') => false,
            _ => return Err(Error::parse("unterminated range", self.pos)),
        };
        self.advance();

        let field_type = self.config.field_type(&field).unwrap_or(FieldType::String);
        for bound in [&lower, &upper] {
            if let Some(value) = bound {
                check_bound_type(&field, field_type, value, self.pos)?;
            }
        }

        Ok(ParseableQuery::Range {
            field,
            field_type,
            lower,
            upper,
            inclusive_lower,
            inclusive_upper,
        })
    }

    fn read_bound(&mut self) -> Result<Option<String>, Error> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || ch == ']' || ch == '}' {
                break;
            }
            self.advance();
        }
        let raw = &self.input[start..self.pos];
        if raw.is_empty() {
            return Err(Error::parse("empty range bound", self.pos));
        }
        Ok(if raw == "*" { None } else { Some(raw.to_string()) })
    }

    fn parse_boost(&mut self) -> Result<f32, Error> {
        if !self.consume_char('^') {
            return Ok(1.0);
        }
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| Error::parse("invalid boost value", start))
    }

    /// A word with backslash escapes, ended by whitespace or grammar
    /// structure.
    fn read_word(&mut self) -> Result<String, Error> {
        let mut out = String::new();
        while let Some(ch) = self.peek_char() {
            match ch {
                '\\' => {
                    self.advance();
                    match self.peek_char() {
                        Some(escaped) => {
                            out.push(escaped);
                            self.advance();
                        }
                        None => return Err(Error::parse("dangling escape", self.pos)),
                    }
                }
                c if c.is_whitespace() => break,
                '(' | ')' | '^' | '"' | '<' | ':' | '[' | ']' | '{' | '}' => break,
                c => {
                    out.push(c);
                    self.advance();
                }
            }
        }
        Ok(out)
    }

    /// A name segment for qNames: no escapes, stricter charset.
    fn read_name(&mut self) -> String {
        let start = self.pos;
        if self.peek_char() == Some('@') {
            self.advance();
        }
        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '{' | '}' | '/') {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn read_quoted(&mut self) -> Result<String, Error> {
        debug_assert_eq!(self.peek_char(), Some('"'));
        self.advance();
        let mut out = String::new();
        loop {
            match self.peek_char() {
                None => return Err(Error::parse("unterminated phrase", self.pos)),
                Some('"') => {
                    self.advance();
                    return Ok(out);
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some(escaped) => {
                            out.push(escaped);
                            self.advance();
                        }
                        None => return Err(Error::parse("dangling escape", self.pos)),
                    }
                }
                Some(ch) => {
                    out.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self
            .peek_char()
            .map(|c| c.is_whitespace())
            .unwrap_or(false)
        {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn remaining(&self) -> &str {
        &self.input[self.pos..]
    }
}

fn check_bound_type(
    field: &str,
    field_type: FieldType,
    value: &str,
    pos: usize,
) -> Result<(), Error> {
    let ok = match field_type {
        FieldType::String => true,
        FieldType::Int => value.parse::<i64>().is_ok(),
        FieldType::Number => value.parse::<f64>().is_ok(),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::parse(
            format!("range bound '{value}' is not a valid {field_type} for field '{field}'"),
            pos,
        ))
    }
}

/// Rewrite pass: promote marker-led boolean groups into span queries.
///
/// A group whose first clause is the term `lux_within:N` becomes an ordered
/// span over the remaining clauses with slop `N - 1`; `lux_near:N` the same
/// but unordered. Groups without a marker pass through, but are still
/// recursed into, since marked groups may be nested.
pub fn promote_spans(query: ParseableQuery) -> Result<ParseableQuery, Error> {
    match query {
        ParseableQuery::Boolean { clauses } => {
            let promoted = clauses
                .into_iter()
                .map(|c| Ok(Clause::new(promote_spans(c.query)?, c.occur)))
                .collect::<Result<Vec<_>, Error>>()?;

            if let Some((marker, rest)) = split_marker(&promoted) {
                let (slop, in_order) = marker;
                let clauses = rest
                    .iter()
                    .map(|c| to_span_clause(&c.query))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(ParseableQuery::SpanNear {
                    clauses,
                    slop,
                    in_order,
                });
            }

            Ok(ParseableQuery::Boolean { clauses: promoted })
        }

        ParseableQuery::SpanNear {
            clauses,
            slop,
            in_order,
        } => Ok(ParseableQuery::SpanNear {
            clauses: clauses
                .into_iter()
                .map(promote_spans)
                .collect::<Result<Vec<_>, _>>()?,
            slop,
            in_order,
        }),

        ParseableQuery::SpanBoolean { clauses, occur } => Ok(ParseableQuery::SpanBoolean {
            clauses: clauses
                .into_iter()
                .map(promote_spans)
                .collect::<Result<Vec<_>, _>>()?,
            occur,
        }),

        other => Ok(other),
    }
}

/// If the group starts with a span marker, return (slop, in_order) and the
/// remaining clauses.
fn split_marker(clauses: &[Clause]) -> Option<((u32, bool), &[Clause])> {
    let first = clauses.first()?;
    let ParseableQuery::Term { field, text, .. } = &first.query else {
        return None;
    };
    let in_order = match field.as_str() {
        f if f == WITHIN_MARKER => true,
        f if f == NEAR_MARKER => false,
        _ => return None,
    };
    let value: u32 = text.parse().ok().filter(|&n| n >= 1)?;
    Some(((value - 1, in_order), &clauses[1..]))
}

/// Convert a clause of a marked group into a span clause.
fn to_span_clause(query: &ParseableQuery) -> Result<ParseableQuery, Error> {
    match query {
        // Terms occupy a single position and are span leaves as-is.
        ParseableQuery::Term { .. }
        | ParseableQuery::NodeText { .. }
        | ParseableQuery::SpanNear { .. }
        | ParseableQuery::SpanBoolean { .. }
        | ParseableQuery::SpanMatchAll => Ok(query.clone()),

        // A nested plain group is a span union of its converted clauses.
        ParseableQuery::Boolean { clauses } => {
            let converted = clauses
                .iter()
                .map(|c| {
                    if c.occur == Occur::MustNot {
                        return Err(Error::SpanMustNot);
                    }
                    to_span_clause(&c.query)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ParseableQuery::SpanBoolean {
                clauses: converted,
                occur: Occur::Should,
            })
        }

        ParseableQuery::MatchAll => Err(Error::SpanConversion("a match-all clause".to_string())),
        ParseableQuery::Range { .. } => Err(Error::SpanConversion("a range clause".to_string())),
    }
}
