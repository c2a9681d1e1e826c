//! XPath-to-query translation.
//!
//! The compiler walks an expression and derives a search query whose result
//! set is a sound over-approximation: every document that could contain a
//! match is retrieved, and never fewer. Alongside the query it records
//! *facts*: whether the query alone answers the expression (`MINIMAL`),
//! whether the answer is a count (`COUNTING`) or an existence test
//! (`BOOLEAN_TRUE`/`BOOLEAN_FALSE`). The collector uses these to pick a
//! short-circuit strategy.
//!
//! Soundness hinges on one compositional property carried by every
//! intermediate translation: whether the derived query characterizes the
//! expression *exactly* or only as a superset. Negation may only narrow
//! (`MUST_NOT`) over an exact operand; anywhere else it widens to a full
//! scan rather than risk excluding a true match.

use crate::error::Error;
use crate::index::config::{FieldType, IndexConfig};
use crate::query::pquery::{Clause, Occur, ParseableQuery};
use crate::query::Bindings;
use crate::tree::qname::{split_qname, QName};
use crate::utils::analyzer::analyze;
use crate::xpath::ast::{Axis, BinaryOp, Expr, NodeTest, SortKey, Step};

/// Compiler-attached metadata guiding result collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFacts(pub u16);

impl QueryFacts {
    /// The query alone determines the result; no retrieval is needed.
    pub const MINIMAL: u16 = 1 << 0;
    /// The answer is a cardinality, not a node set.
    pub const COUNTING: u16 = 1 << 1;
    /// The answer is existence; a hit means `true`.
    pub const BOOLEAN_TRUE: u16 = 1 << 2;
    /// The answer is existence of a negated predicate; a hit means `false`.
    pub const BOOLEAN_FALSE: u16 = 1 << 3;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    pub fn is_minimal(&self) -> bool {
        self.0 & Self::MINIMAL != 0
    }

    pub fn is_counting(&self) -> bool {
        self.0 & Self::COUNTING != 0
    }

    pub fn is_boolean(&self) -> bool {
        self.0 & (Self::BOOLEAN_TRUE | Self::BOOLEAN_FALSE) != 0
    }

    /// For boolean facts: does a search hit mean the answer is `true`?
    pub fn boolean_on_hit(&self) -> bool {
        self.0 & Self::BOOLEAN_TRUE != 0
    }

    /// Human-readable flag names, for diagnostics.
    pub fn names(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.is_minimal() {
            out.push("minimal");
        }
        if self.is_counting() {
            out.push("counting");
        }
        if self.0 & Self::BOOLEAN_TRUE != 0 {
            out.push("boolean-true");
        }
        if self.0 & Self::BOOLEAN_FALSE != 0 {
            out.push("boolean-false");
        }
        out
    }
}

/// The static type of an expression's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Value,
    Document,
    Node,
    Element,
    Attribute,
    Text,
    Atomic,
    String,
    Int,
    Number,
}

impl ValueType {
    /// Subtype check: a type `is` another if they are equal, if the other
    /// is the universal VALUE, or via generalization to ATOMIC, NODE, or
    /// DOCUMENT.
    pub fn is(self, other: ValueType) -> bool {
        if self == other || other == ValueType::Value {
            return true;
        }
        match other {
            ValueType::Atomic => matches!(
                self,
                ValueType::String | ValueType::Int | ValueType::Number
            ),
            ValueType::Node => matches!(
                self,
                ValueType::Document | ValueType::Element | ValueType::Attribute | ValueType::Text
            ),
            ValueType::Document => self == ValueType::Element,
            _ => false,
        }
    }
}

/// A sort the search engine can apply natively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub field_type: FieldType,
    pub descending: bool,
}

/// A fully compiled query: what to run and how to collect it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: ParseableQuery,
    pub facts: QueryFacts,
    pub value_type: ValueType,
    pub sort: Option<SortSpec>,
}

/// Compilation outcome. `FullScan` is the ordinary "not translatable"
/// result: evaluate the expression in memory over every document.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Query(CompiledQuery),
    FullScan,
}

/// How faithfully a derived query characterizes its expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exactness {
    /// Query matches exactly the documents satisfying the expression.
    Exact,
    /// Query matches a superset; the engine must still verify.
    Superset,
    /// No constraint could be derived at all.
    Any,
}

impl Exactness {
    fn weaken(self) -> Self {
        match self {
            Self::Exact => Self::Superset,
            other => other,
        }
    }
}

/// An intermediate translation.
#[derive(Debug, Clone)]
struct Draft {
    query: ParseableQuery,
    exact: Exactness,
    value_type: ValueType,
}

impl Draft {
    fn any(value_type: ValueType) -> Self {
        Self {
            query: ParseableQuery::MatchAll,
            exact: Exactness::Any,
            value_type,
        }
    }
}

/// Translates expressions against an index configuration and the namespace
/// bindings in scope.
pub struct Compiler<'a> {
    config: &'a IndexConfig,
    bindings: &'a Bindings,
}

impl<'a> Compiler<'a> {
    pub fn new(config: &'a IndexConfig, bindings: &'a Bindings) -> Self {
        Self { config, bindings }
    }

    /// Compile a whole expression, recognizing the top-level reductions
    /// (count, existence, ordering) that change the collection strategy.
    pub fn compile(&self, expr: &Expr) -> Result<Translation, Error> {
        if let Expr::FunctionCall { name, args } = expr {
            match (local_function_name(name), args.as_slice()) {
                ("count", [arg]) => {
                    let draft = self.translate(arg)?;
                    if draft.exact == Exactness::Any {
                        return Ok(Translation::FullScan);
                    }
                    let mut facts = QueryFacts::new();
                    facts.set(QueryFacts::COUNTING);
                    if draft.exact == Exactness::Exact {
                        facts.set(QueryFacts::MINIMAL);
                    }
                    return Ok(Translation::Query(CompiledQuery {
                        query: draft.query,
                        facts,
                        value_type: ValueType::Int,
                        sort: None,
                    }));
                }
                ("exists", [arg]) | ("boolean", [arg]) => {
                    return self.compile_existence(arg, true);
                }
                ("empty", [arg]) => return self.compile_existence(arg, false),
                ("not", [arg]) => {
                    // not(exists(X)) and not(X) are the same reduction.
                    let inner = match arg {
                        Expr::FunctionCall { name, args }
                            if local_function_name(name) == "exists" && args.len() == 1 =>
                        {
                            &args[0]
                        }
                        other => other,
                    };
                    return self.compile_existence(inner, false);
                }
                _ => {}
            }
        }

        if let Expr::OrderBy { input, keys } = expr {
            let draft = self.translate(input)?;
            let sort = self.sort_pushdown(keys);
            if draft.exact == Exactness::Any && sort.is_none() {
                return Ok(Translation::FullScan);
            }
            return Ok(Translation::Query(CompiledQuery {
                query: draft.query,
                facts: QueryFacts::new(),
                value_type: draft.value_type,
                sort,
            }));
        }

        let draft = self.translate(expr)?;
        if draft.exact == Exactness::Any {
            return Ok(Translation::FullScan);
        }
        Ok(Translation::Query(CompiledQuery {
            query: draft.query,
            facts: QueryFacts::new(),
            value_type: draft.value_type,
            sort: None,
        }))
    }

    /// Existence reductions. A positive test tolerates a superset query
    /// (the engine verifies candidates); a negative one does not: the
    /// complement of a superset can silently drop true answers, so anything
    /// short of exact falls back to a full scan.
    fn compile_existence(&self, expr: &Expr, positive: bool) -> Result<Translation, Error> {
        let draft = self.translate(expr)?;
        match draft.exact {
            Exactness::Any => return Ok(Translation::FullScan),
            Exactness::Superset if !positive => return Ok(Translation::FullScan),
            _ => {}
        }
        let mut facts = QueryFacts::new();
        facts.set(if positive {
            QueryFacts::BOOLEAN_TRUE
        } else {
            QueryFacts::BOOLEAN_FALSE
        });
        if draft.exact == Exactness::Exact {
            facts.set(QueryFacts::MINIMAL);
        }
        Ok(Translation::Query(CompiledQuery {
            query: draft.query,
            facts,
            value_type: ValueType::Atomic,
            sort: None,
        }))
    }

    fn translate(&self, expr: &Expr) -> Result<Draft, Error> {
        match expr {
            Expr::Number(n) => Ok(Draft {
                query: ParseableQuery::MatchAll,
                exact: Exactness::Superset,
                value_type: if n.fract() == 0.0 {
                    ValueType::Int
                } else {
                    ValueType::Number
                },
            }),

            Expr::Literal(_) => Ok(Draft {
                query: ParseableQuery::MatchAll,
                exact: Exactness::Superset,
                value_type: ValueType::String,
            }),

            Expr::Variable(_) => Ok(Draft::any(ValueType::Value)),

            Expr::Negate(_) => Ok(Draft {
                query: ParseableQuery::MatchAll,
                exact: Exactness::Superset,
                value_type: ValueType::Number,
            }),

            Expr::Binary { op, left, right } => self.translate_binary(*op, left, right),

            Expr::FunctionCall { name, args } => self.translate_function(name, args),

            Expr::Path { absolute, steps } => self.translate_path(*absolute, steps),

            Expr::Filter { expr, predicates } => {
                let base = self.translate(expr)?;
                let mut parts = vec![base.query.clone()];
                for predicate in predicates {
                    let pred = self.translate(predicate)?;
                    parts.push(pred.query);
                }
                Ok(Draft {
                    query: and_queries(parts),
                    exact: base.exact.weaken(),
                    value_type: base.value_type,
                })
            }

            Expr::Union(left, right) => {
                let l = self.translate(left)?;
                let r = self.translate(right)?;
                Ok(or_drafts(l, r, ValueType::Node))
            }

            Expr::OrderBy { input, .. } => self.translate(input),
        }
    }

    fn translate_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Draft, Error> {
        match op {
            BinaryOp::And => {
                let l = self.translate(left)?;
                let r = self.translate(right)?;
                Ok(and_drafts(l, r, ValueType::Atomic))
            }
            BinaryOp::Or => {
                let l = self.translate(left)?;
                let r = self.translate(right)?;
                Ok(or_drafts(l, r, ValueType::Atomic))
            }
            BinaryOp::Eq | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
                self.translate_comparison(op, left, right)
            }
            // `!=` cannot narrow: a document containing the element with a
            // different value still matches. Element presence is all we
            // keep.
            BinaryOp::Neq => {
                let presence = self.presence_of(left).or_else(|| self.presence_of(right));
                Ok(match presence {
                    Some(query) => Draft {
                        query,
                        exact: Exactness::Superset,
                        value_type: ValueType::Atomic,
                    },
                    None => Draft::any(ValueType::Atomic),
                })
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                Ok(Draft {
                    query: ParseableQuery::MatchAll,
                    exact: Exactness::Superset,
                    value_type: ValueType::Number,
                })
            }
        }
    }

    fn translate_comparison(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Draft, Error> {
        // Normalize to `path op literal`.
        let (path, literal, op) = match (left, right) {
            (Expr::Path { .. }, Expr::Literal(_) | Expr::Number(_)) => (left, right, op),
            (Expr::Literal(_) | Expr::Number(_), Expr::Path { .. }) => {
                (right, left, op.flipped())
            }
            _ => return Ok(Draft::any(ValueType::Atomic)),
        };
        let Expr::Path { absolute, steps } = path else {
            unreachable!()
        };

        let presence = self.translate_path(*absolute, steps)?;
        let Some(last) = steps.last() else {
            return Ok(Draft::any(ValueType::Atomic));
        };
        let Some(qname) = self.step_qname(last)? else {
            // Comparison against an unnamed step narrows no further than
            // the path itself.
            return Ok(Draft {
                query: presence.query,
                exact: Exactness::Superset,
                value_type: ValueType::Atomic,
            });
        };

        // A registered typed field turns the comparison into a range.
        if let Some(field_type) = self.config.field_type(&qname.local) {
            let value = literal_value(literal, &qname.local, field_type)?;
            let range = range_for(op, qname.local.clone(), field_type, value);
            return Ok(Draft {
                query: and_queries(vec![presence.query, range]),
                exact: Exactness::Superset,
                value_type: ValueType::Atomic,
            });
        }

        // Equality on element/attribute text becomes a scoped phrase.
        if op == BinaryOp::Eq {
            if let Expr::Literal(text) = literal {
                let scoped = self.node_text_query(last, &qname, text)?;
                return Ok(Draft {
                    query: and_queries(vec![presence.query, scoped]),
                    exact: Exactness::Superset,
                    value_type: ValueType::Atomic,
                });
            }
        }

        // Ordered comparison on an untyped field: element presence only.
        Ok(Draft {
            query: presence.query,
            exact: Exactness::Superset,
            value_type: ValueType::Atomic,
        })
    }

    fn translate_function(&self, name: &str, args: &[Expr]) -> Result<Draft, Error> {
        match (local_function_name(name), args) {
            ("count", [arg]) => {
                let inner = self.translate(arg)?;
                Ok(Draft {
                    query: inner.query,
                    exact: inner.exact.weaken(),
                    value_type: ValueType::Int,
                })
            }

            ("exists", [arg]) | ("boolean", [arg]) => {
                let inner = self.translate(arg)?;
                Ok(Draft {
                    query: inner.query,
                    exact: inner.exact,
                    value_type: ValueType::Atomic,
                })
            }

            // Nested negation may only narrow over an exact operand; a
            // MUST_NOT over a mere superset would wrongly exclude
            // documents, so everything else widens to a full scan.
            ("not", [arg]) | ("empty", [arg]) => {
                let inner = self.translate(arg)?;
                if inner.exact == Exactness::Exact {
                    Ok(Draft {
                        query: ParseableQuery::Boolean {
                            clauses: vec![
                                Clause::new(ParseableQuery::MatchAll, Occur::Must),
                                Clause::new(inner.query, Occur::MustNot),
                            ],
                        },
                        exact: Exactness::Exact,
                        value_type: ValueType::Atomic,
                    })
                } else {
                    Ok(Draft::any(ValueType::Atomic))
                }
            }

            ("contains", [haystack, Expr::Literal(needle)]) => {
                self.translate_contains(haystack, needle)
            }

            ("string", [arg]) | ("data", [arg]) | ("normalize-space", [arg]) => {
                let inner = self.translate(arg)?;
                Ok(Draft {
                    query: inner.query,
                    exact: inner.exact.weaken(),
                    value_type: ValueType::String,
                })
            }

            ("position", []) | ("last", []) => Ok(Draft {
                query: ParseableQuery::MatchAll,
                exact: Exactness::Superset,
                value_type: ValueType::Int,
            }),

            // Unknown functions have unknown semantics; assume nothing.
            _ => Ok(Draft::any(ValueType::Value)),
        }
    }

    /// `contains` over document or element text becomes a term or phrase
    /// on the corresponding text field. A substring match implies its
    /// analyzed tokens occur adjacently, so this narrows soundly.
    fn translate_contains(&self, haystack: &Expr, needle: &str) -> Result<Draft, Error> {
        let tokens = analyze(needle);
        if tokens.is_empty() {
            return Ok(Draft::any(ValueType::Atomic));
        }

        if let Expr::Path { absolute, steps } = haystack {
            if let Some(last) = steps.last() {
                if let Some(qname) = self.step_qname(last)? {
                    let presence = self.translate_path(*absolute, steps)?;
                    let scoped = self.node_text_query(last, &qname, needle)?;
                    return Ok(Draft {
                        query: and_queries(vec![presence.query, scoped]),
                        exact: Exactness::Superset,
                        value_type: ValueType::Atomic,
                    });
                }
            }
        }

        // Context item or anything else: the tokens still have to appear
        // somewhere in the document text.
        let field = &self.config.fields.text_field;
        let query = if tokens.len() == 1 {
            ParseableQuery::term(field, tokens.into_iter().next().unwrap())
        } else {
            ParseableQuery::phrase(
                tokens
                    .into_iter()
                    .map(|t| ParseableQuery::term(field.clone(), t))
                    .collect(),
            )
        };
        Ok(Draft {
            query,
            exact: Exactness::Superset,
            value_type: ValueType::Atomic,
        })
    }

    fn translate_path(&self, absolute: bool, steps: &[Step]) -> Result<Draft, Error> {
        if steps.is_empty() {
            // Bare `/`: every document has a document node.
            return Ok(Draft {
                query: ParseableQuery::MatchAll,
                exact: if absolute {
                    Exactness::Exact
                } else {
                    Exactness::Superset
                },
                value_type: ValueType::Document,
            });
        }

        let mut parts = Vec::new();
        let mut constrained_all = true;

        for step in steps {
            if !step.axis.is_forward() {
                constrained_all = false;
                continue;
            }
            match self.step_qname(step)? {
                Some(qname) => {
                    let field = if step.axis == Axis::Attribute {
                        &self.config.fields.att_name_field
                    } else {
                        &self.config.fields.elt_name_field
                    };
                    parts.push(ParseableQuery::term(field.clone(), qname.encoded()));
                }
                None => constrained_all = false,
            }
            for predicate in &step.predicates {
                let pred = self.translate(predicate)?;
                if !matches!(pred.query, ParseableQuery::MatchAll) {
                    parts.push(pred.query);
                }
            }
        }

        let exact = if parts.is_empty() {
            Exactness::Any
        } else if steps.len() == 1
            && constrained_all
            && steps[0].predicates.is_empty()
            && matches!(steps[0].axis, Axis::Descendant | Axis::DescendantOrSelf)
        {
            // `//name` with nothing else: a document matches the name term
            // exactly when it contains such an element.
            Exactness::Exact
        } else {
            Exactness::Superset
        };

        let last = steps.last().expect("steps checked non-empty");
        let value_type = if last.axis == Axis::Attribute {
            ValueType::Attribute
        } else {
            match last.node_test {
                NodeTest::Text => ValueType::Text,
                NodeTest::Node => ValueType::Node,
                _ => ValueType::Element,
            }
        };

        Ok(Draft {
            query: and_queries(parts),
            exact,
            value_type,
        })
    }

    /// The resolved QName of a named step, or `None` for kind tests and
    /// wildcards.
    fn step_qname(&self, step: &Step) -> Result<Option<QName>, Error> {
        let NodeTest::Name(written) = &step.node_test else {
            return Ok(None);
        };
        match split_qname(written) {
            (None, local) => Ok(Some(QName::local(local))),
            (Some(prefix), local) => match self.bindings.resolve(prefix) {
                Some(uri) => Ok(Some(QName::new(local, uri, prefix))),
                None if self.config.namespace_aware => {
                    Err(Error::UnboundPrefix(prefix.to_string()))
                }
                None => Ok(Some(QName::local(written.clone()))),
            },
        }
    }

    /// A term/phrase over the element or attribute text field, scoped to
    /// the step's QName.
    fn node_text_query(
        &self,
        step: &Step,
        qname: &QName,
        text: &str,
    ) -> Result<ParseableQuery, Error> {
        let (field, qname_key) = if step.axis == Axis::Attribute {
            (
                self.config.fields.att_text_field.clone(),
                format!("@{}", qname.encoded()),
            )
        } else {
            (self.config.fields.elt_text_field.clone(), qname.encoded())
        };

        let tokens = analyze(text);
        Ok(match tokens.len() {
            0 => ParseableQuery::MatchAll,
            1 => ParseableQuery::node_text(field, qname_key, tokens.into_iter().next().unwrap()),
            _ => ParseableQuery::phrase(
                tokens
                    .into_iter()
                    .map(|t| ParseableQuery::node_text(field.clone(), qname_key.clone(), t))
                    .collect(),
            ),
        })
    }

    /// Element-presence query for a comparison operand, used where the
    /// comparison itself cannot narrow.
    fn presence_of(&self, expr: &Expr) -> Option<ParseableQuery> {
        let Expr::Path { absolute, steps } = expr else {
            return None;
        };
        let draft = self.translate_path(*absolute, steps).ok()?;
        match draft.exact {
            Exactness::Any => None,
            _ => Some(draft.query),
        }
    }

    /// `order by` pushdown: only a bare access to a registered typed field
    /// can use the engine's native sort; any computation in the key keeps
    /// sorting in memory.
    fn sort_pushdown(&self, keys: &[SortKey]) -> Option<SortSpec> {
        let [key] = keys else {
            return None;
        };
        let Expr::Path {
            absolute: false,
            steps,
        } = &key.key
        else {
            return None;
        };
        let [step] = steps.as_slice() else {
            return None;
        };
        if !step.axis.is_forward() || !step.predicates.is_empty() {
            return None;
        }
        let NodeTest::Name(name) = &step.node_test else {
            return None;
        };
        let field_type = self.config.field_type(name)?;
        Some(SortSpec {
            field: name.clone(),
            field_type,
            descending: key.descending,
        })
    }
}

fn local_function_name(name: &str) -> &str {
    split_qname(name).1
}

/// AND together the non-trivial parts. `MatchAll` factors are dropped and
/// nested all-MUST booleans are inlined, keeping conjunction chains flat.
fn and_queries(parts: Vec<ParseableQuery>) -> ParseableQuery {
    let mut filtered: Vec<ParseableQuery> = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            ParseableQuery::MatchAll => {}
            ParseableQuery::Boolean { clauses }
                if clauses.iter().all(|c| c.occur == Occur::Must) =>
            {
                filtered.extend(clauses.into_iter().map(|c| c.query));
            }
            other => filtered.push(other),
        }
    }
    match filtered.len() {
        0 => ParseableQuery::MatchAll,
        1 => filtered.remove(0),
        _ => ParseableQuery::boolean(Occur::Must, filtered),
    }
}

fn and_drafts(l: Draft, r: Draft, value_type: ValueType) -> Draft {
    let exact = match (l.exact, r.exact) {
        (Exactness::Exact, Exactness::Exact) => Exactness::Exact,
        (Exactness::Any, Exactness::Any) => Exactness::Any,
        _ => Exactness::Superset,
    };
    Draft {
        query: and_queries(vec![l.query, r.query]),
        exact,
        value_type,
    }
}

/// OR: if either side is unconstrained the union is too; a SHOULD clause
/// that matches everything narrows nothing.
fn or_drafts(l: Draft, r: Draft, value_type: ValueType) -> Draft {
    if l.exact == Exactness::Any || r.exact == Exactness::Any {
        return Draft::any(value_type);
    }
    let exact = match (l.exact, r.exact) {
        (Exactness::Exact, Exactness::Exact) => Exactness::Exact,
        _ => Exactness::Superset,
    };
    Draft {
        query: ParseableQuery::boolean(Occur::Should, vec![l.query, r.query]),
        exact,
        value_type,
    }
}

fn literal_value(literal: &Expr, field: &str, field_type: FieldType) -> Result<String, Error> {
    let mismatch = |actual: &str| Error::TypeMismatch {
        field: field.to_string(),
        expected: field_type.as_str().to_string(),
        actual: actual.to_string(),
    };
    match (literal, field_type) {
        (Expr::Number(n), FieldType::Int) => {
            if n.fract() != 0.0 {
                return Err(mismatch("number"));
            }
            Ok(format!("{}", *n as i64))
        }
        (Expr::Number(n), FieldType::Number) => Ok(n.to_string()),
        (Expr::Number(_), FieldType::String) => Err(mismatch("number")),
        (Expr::Literal(_), FieldType::Int) | (Expr::Literal(_), FieldType::Number) => {
            Err(mismatch("string"))
        }
        (Expr::Literal(s), FieldType::String) => Ok(s.clone()),
        _ => Err(mismatch("expression")),
    }
}

fn range_for(
    op: BinaryOp,
    field: String,
    field_type: FieldType,
    value: String,
) -> ParseableQuery {
    let (lower, upper, inclusive_lower, inclusive_upper) = match op {
        BinaryOp::Eq => (Some(value.clone()), Some(value), true, true),
        BinaryOp::Lt => (None, Some(value), false, false),
        BinaryOp::Lte => (None, Some(value), false, true),
        BinaryOp::Gt => (Some(value), None, false, false),
        BinaryOp::Gte => (Some(value), None, true, false),
        _ => unreachable!("range_for called with non-comparison operator"),
    };
    ParseableQuery::Range {
        field,
        field_type,
        lower,
        upper,
        inclusive_lower,
        inclusive_upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::parser::parse_xpath;

    fn compile(xpath: &str) -> Translation {
        let config = IndexConfig::default().with_typed_field("year", FieldType::Int);
        let bindings = Bindings::new();
        let expr = parse_xpath(xpath).unwrap();
        Compiler::new(&config, &bindings).compile(&expr).unwrap()
    }

    fn compiled(xpath: &str) -> CompiledQuery {
        match compile(xpath) {
            Translation::Query(c) => c,
            Translation::FullScan => panic!("{xpath} unexpectedly untranslatable"),
        }
    }

    #[test]
    fn test_descendant_step() {
        let c = compiled("//title");
        assert_eq!(c.query, ParseableQuery::term("lux_elt_name", "title"));
        assert_eq!(c.value_type, ValueType::Element);
        assert!(!c.facts.is_minimal());
    }

    #[test]
    fn test_path_chain() {
        let c = compiled("/play/title");
        assert_eq!(
            c.query,
            ParseableQuery::boolean(
                Occur::Must,
                vec![
                    ParseableQuery::term("lux_elt_name", "play"),
                    ParseableQuery::term("lux_elt_name", "title"),
                ]
            )
        );
    }

    #[test]
    fn test_attribute_step() {
        let c = compiled("//act/@n");
        let ParseableQuery::Boolean { clauses } = &c.query else {
            panic!("expected boolean");
        };
        assert_eq!(
            clauses[1].query,
            ParseableQuery::term("lux_att_name", "n")
        );
        assert_eq!(c.value_type, ValueType::Attribute);
    }

    #[test]
    fn test_count_facts() {
        let c = compiled("count(//title)");
        assert!(c.facts.is_counting());
        assert!(c.facts.is_minimal());
        assert_eq!(c.value_type, ValueType::Int);
    }

    #[test]
    fn test_count_superset_not_minimal() {
        let c = compiled("count(/play/title)");
        assert!(c.facts.is_counting());
        assert!(!c.facts.is_minimal());
    }

    #[test]
    fn test_exists_facts() {
        let c = compiled("exists(//title)");
        assert!(c.facts.is_boolean());
        assert!(c.facts.boolean_on_hit());
        assert!(c.facts.is_minimal());
    }

    #[test]
    fn test_negated_existence_facts() {
        let c = compiled("not(exists(//title))");
        assert!(c.facts.is_boolean());
        assert!(!c.facts.boolean_on_hit());
        assert!(c.facts.is_minimal());
        // BOOLEAN_TRUE and BOOLEAN_FALSE are mutually exclusive.
        assert_eq!(c.facts.0 & QueryFacts::BOOLEAN_TRUE, 0);
    }

    #[test]
    fn test_negated_superset_falls_back() {
        // /play/title is only a superset; its complement cannot narrow.
        assert_eq!(compile("not(/play/title)"), Translation::FullScan);
    }

    #[test]
    fn test_union_is_should() {
        let c = compiled("//speech | //stage");
        assert_eq!(
            c.query,
            ParseableQuery::boolean(
                Occur::Should,
                vec![
                    ParseableQuery::term("lux_elt_name", "speech"),
                    ParseableQuery::term("lux_elt_name", "stage"),
                ]
            )
        );
    }

    #[test]
    fn test_exists_union_minimal() {
        let c = compiled("exists(//speech | //stage)");
        assert!(c.facts.is_minimal());
    }

    #[test]
    fn test_and_is_must() {
        let c = compiled("//a and //b");
        assert_eq!(
            c.query,
            ParseableQuery::boolean(
                Occur::Must,
                vec![
                    ParseableQuery::term("lux_elt_name", "a"),
                    ParseableQuery::term("lux_elt_name", "b"),
                ]
            )
        );
    }

    #[test]
    fn test_contains_on_context() {
        let c = compiled("//title[contains(., 'Hamlet')]");
        let ParseableQuery::Boolean { clauses } = &c.query else {
            panic!("expected boolean: {:?}", c.query);
        };
        assert_eq!(
            clauses[0].query,
            ParseableQuery::term("lux_elt_name", "title")
        );
        assert_eq!(clauses[1].query, ParseableQuery::term("lux_text", "hamlet"));
    }

    #[test]
    fn test_contains_on_path() {
        let c = compiled("contains(//title, 'Hamlet')");
        let ParseableQuery::Boolean { clauses } = &c.query else {
            panic!("expected boolean");
        };
        assert_eq!(
            clauses[1].query,
            ParseableQuery::node_text("lux_elt_text", "title", "hamlet")
        );
    }

    #[test]
    fn test_equality_to_scoped_phrase() {
        let c = compiled("//title[. = 'x']");
        // Predicate on '.' cannot be scoped; element presence remains.
        assert_eq!(c.query, ParseableQuery::term("lux_elt_name", "title"));

        let c = compiled("//speech[speaker = 'HAMLET']");
        let ParseableQuery::Boolean { clauses } = &c.query else {
            panic!("expected boolean");
        };
        assert!(clauses.iter().any(|cl| cl.query
            == ParseableQuery::node_text("lux_elt_text", "speaker", "hamlet")));
    }

    #[test]
    fn test_typed_range() {
        let c = compiled("//play[year >= 1600]");
        let ParseableQuery::Boolean { clauses } = &c.query else {
            panic!("expected boolean");
        };
        let range = clauses
            .iter()
            .find_map(|cl| match &cl.query {
                q @ ParseableQuery::Range { .. } => Some(q.clone()),
                _ => None,
            })
            .expect("range clause");
        assert_eq!(
            range,
            ParseableQuery::Range {
                field: "year".to_string(),
                field_type: FieldType::Int,
                lower: Some("1600".to_string()),
                upper: None,
                inclusive_lower: true,
                inclusive_upper: false,
            }
        );
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let config = IndexConfig::default().with_typed_field("year", FieldType::Int);
        let bindings = Bindings::new();
        let expr = parse_xpath("//play[year = 'sixteen-oh-three']").unwrap();
        let err = Compiler::new(&config, &bindings).compile(&expr).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_variable_is_full_scan() {
        assert_eq!(compile("$docs"), Translation::FullScan);
    }

    #[test]
    fn test_unknown_function_is_full_scan() {
        assert_eq!(compile("my:whatever(//a)"), Translation::FullScan);
    }

    #[test]
    fn test_wildcard_step_no_constraint() {
        assert_eq!(compile("//*"), Translation::FullScan);
    }

    #[test]
    fn test_bare_root_is_exact() {
        let c = compiled("/");
        assert_eq!(c.query, ParseableQuery::MatchAll);
        assert_eq!(c.value_type, ValueType::Document);
    }

    #[test]
    fn test_sort_pushdown() {
        let config = IndexConfig::default().with_typed_field("year", FieldType::Int);
        let bindings = Bindings::new();
        let expr = Expr::OrderBy {
            input: Box::new(Expr::descendant("play")),
            keys: vec![SortKey {
                key: Expr::Path {
                    absolute: false,
                    steps: vec![Step::new(Axis::Child, NodeTest::Name("year".to_string()))],
                },
                descending: true,
            }],
        };
        let Translation::Query(c) = Compiler::new(&config, &bindings).compile(&expr).unwrap()
        else {
            panic!("expected query");
        };
        assert_eq!(
            c.sort,
            Some(SortSpec {
                field: "year".to_string(),
                field_type: FieldType::Int,
                descending: true,
            })
        );
    }

    #[test]
    fn test_sort_on_computed_key_not_pushed() {
        let config = IndexConfig::default().with_typed_field("year", FieldType::Int);
        let bindings = Bindings::new();
        let expr = Expr::OrderBy {
            input: Box::new(Expr::descendant("play")),
            keys: vec![SortKey {
                key: Expr::binary(
                    BinaryOp::Add,
                    Expr::Path {
                        absolute: false,
                        steps: vec![Step::new(Axis::Child, NodeTest::Name("year".to_string()))],
                    },
                    Expr::Number(1.0),
                ),
                descending: false,
            }],
        };
        let Translation::Query(c) = Compiler::new(&config, &bindings).compile(&expr).unwrap()
        else {
            panic!("expected query");
        };
        assert_eq!(c.sort, None);
    }

    #[test]
    fn test_namespaced_step() {
        let config = IndexConfig::default();
        let mut bindings = Bindings::new();
        bindings.bind("tei", "http://www.tei-c.org/ns/1.0");
        let expr = parse_xpath("//tei:title").unwrap();
        let Translation::Query(c) = Compiler::new(&config, &bindings).compile(&expr).unwrap()
        else {
            panic!("expected query");
        };
        assert_eq!(
            c.query,
            ParseableQuery::term("lux_elt_name", "title{http://www.tei-c.org/ns/1.0}")
        );
    }

    #[test]
    fn test_unbound_step_prefix_errors() {
        let config = IndexConfig::default();
        let bindings = Bindings::new();
        let expr = parse_xpath("//tei:title").unwrap();
        let err = Compiler::new(&config, &bindings).compile(&expr).unwrap_err();
        assert_eq!(err, Error::UnboundPrefix("tei".to_string()));
    }

    #[test]
    fn test_value_type_lattice() {
        assert!(ValueType::Element.is(ValueType::Node));
        assert!(ValueType::Element.is(ValueType::Value));
        assert!(ValueType::Int.is(ValueType::Atomic));
        assert!(ValueType::Element.is(ValueType::Document));
        assert!(!ValueType::Element.is(ValueType::Atomic));
        assert!(!ValueType::Node.is(ValueType::Element));
        assert!(ValueType::Text.is(ValueType::Text));
    }
}
