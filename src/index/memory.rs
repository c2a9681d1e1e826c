//! An in-memory index collaborator.
//!
//! The production search engine lives outside this crate; this is the
//! smallest faithful stand-in honoring the same contracts (field naming,
//! term shapes, postings-in-native-order, stored documents) so the
//! compiler and collector can be exercised end to end. Positional (span)
//! queries are evaluated as their boolean over-approximation, which is all
//! candidate retrieval requires.

use ahash::AHashMap;
use roaring::RoaringBitmap;

use crate::codec;
use crate::error::Error;
use crate::index::config::{DocumentStorage, FieldType, IndexConfig};
use crate::index::store::{StoredDocument, StoredFields};
use crate::query::compiler::SortSpec;
use crate::query::pquery::{Occur, ParseableQuery};
use crate::tree::{Document, NodeKind};
use crate::utils::analyzer::analyze;

/// Document identifier within one index.
pub type DocId = u32;

struct DocEntry {
    uri: String,
    stored: StoredDocument,
}

/// Field -> term -> postings, plus stored documents.
pub struct MemoryIndex {
    config: IndexConfig,
    postings: AHashMap<String, AHashMap<String, RoaringBitmap>>,
    /// Per typed field: the raw value seen in each document, for range
    /// filtering and native sorting.
    typed_values: AHashMap<String, AHashMap<DocId, String>>,
    docs: Vec<DocEntry>,
}

impl MemoryIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            postings: AHashMap::new(),
            typed_values: AHashMap::new(),
            docs: Vec::new(),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn doc_count(&self) -> u64 {
        self.docs.len() as u64
    }

    pub fn uri(&self, doc: DocId) -> Option<&str> {
        self.docs.get(doc as usize).map(|d| d.uri.as_str())
    }

    /// Index a document and store its serialized form per configuration.
    pub fn add_document(&mut self, uri: &str, doc: &Document) -> DocId {
        let doc_id = self.docs.len() as DocId;
        let fields = self.config.fields.clone();

        self.insert(&fields.uri_field, uri.to_string(), doc_id);

        for id in doc.ids() {
            match &doc.node(id).kind {
                NodeKind::Element {
                    name, attributes, ..
                } => {
                    let encoded = name.encoded();
                    self.insert(&fields.elt_name_field, encoded.clone(), doc_id);
                    self.insert(&fields.path_field, doc.path_of(id), doc_id);

                    let text = doc.text(id);
                    for token in analyze(&text) {
                        self.insert(
                            &fields.elt_text_field,
                            format!("{encoded}:{token}"),
                            doc_id,
                        );
                    }
                    if self.config.field_type(&name.local).is_some() {
                        self.typed_values
                            .entry(name.local.clone())
                            .or_default()
                            .insert(doc_id, text.trim().to_string());
                    }

                    for attr in attributes {
                        let attr_encoded = attr.name.encoded();
                        self.insert(&fields.att_name_field, attr_encoded.clone(), doc_id);
                        for token in analyze(&attr.value) {
                            self.insert(
                                &fields.att_text_field,
                                format!("@{attr_encoded}:{token}"),
                                doc_id,
                            );
                        }
                        if self.config.field_type(&attr.name.local).is_some() {
                            self.typed_values
                                .entry(attr.name.local.clone())
                                .or_default()
                                .insert(doc_id, attr.value.trim().to_string());
                        }
                    }
                }
                NodeKind::Text { content } => {
                    for token in analyze(content) {
                        self.insert(&fields.text_field, token, doc_id);
                    }
                }
                _ => {}
            }
        }

        let stored = match self.config.storage {
            DocumentStorage::BinaryTree => StoredDocument::BinaryTree(codec::encode(doc)),
            DocumentStorage::RawXml => StoredDocument::RawXml(doc.to_xml()),
        };
        self.docs.push(DocEntry {
            uri: uri.to_string(),
            stored,
        });
        doc_id
    }

    fn insert(&mut self, field: &str, term: String, doc_id: DocId) {
        self.postings
            .entry(field.to_string())
            .or_default()
            .entry(term)
            .or_default()
            .insert(doc_id);
    }

    pub fn all_docs(&self) -> RoaringBitmap {
        (0..self.docs.len() as DocId).collect()
    }

    fn lookup(&self, field: &str, term: &str) -> RoaringBitmap {
        self.postings
            .get(field)
            .and_then(|terms| terms.get(term))
            .cloned()
            .unwrap_or_default()
    }

    /// Evaluate a query to its candidate document set.
    pub fn execute(&self, query: &ParseableQuery) -> Result<RoaringBitmap, Error> {
        match query {
            ParseableQuery::MatchAll | ParseableQuery::SpanMatchAll => Ok(self.all_docs()),

            ParseableQuery::Term { field, text, .. } => Ok(self.lookup(field, text)),

            ParseableQuery::NodeText {
                field, qname, text, ..
            } => {
                let term = if qname.is_empty() {
                    text.clone()
                } else {
                    format!("{qname}:{text}")
                };
                Ok(self.lookup(field, &term))
            }

            ParseableQuery::Range {
                field,
                field_type,
                lower,
                upper,
                inclusive_lower,
                inclusive_upper,
            } => Ok(self.execute_range(
                field,
                *field_type,
                lower.as_deref(),
                upper.as_deref(),
                *inclusive_lower,
                *inclusive_upper,
            )),

            ParseableQuery::Boolean { clauses } => {
                let mut positive: Option<RoaringBitmap> = None;
                let mut negative = RoaringBitmap::new();
                let mut saw_positive = false;

                for clause in clauses {
                    let sub = self.execute(&clause.query)?;
                    match clause.occur {
                        Occur::Must => {
                            saw_positive = true;
                            positive = Some(match positive {
                                Some(acc) => acc & sub,
                                None => sub,
                            });
                        }
                        Occur::Should => {
                            saw_positive = true;
                            positive = Some(match positive {
                                Some(acc) => acc | sub,
                                None => sub,
                            });
                        }
                        Occur::MustNot => negative |= sub,
                    }
                }

                let base = match (positive, saw_positive) {
                    (Some(bitmap), _) => bitmap,
                    // Pure exclusions filter the whole collection.
                    (None, false) => self.all_docs(),
                    (None, true) => RoaringBitmap::new(),
                };
                Ok(base - negative)
            }

            // Positional constraints are over-approximated by conjunction:
            // a document lacking any clause cannot contain the span.
            ParseableQuery::SpanNear { clauses, .. } => self.execute_all_of(clauses),

            ParseableQuery::SpanBoolean { clauses, occur } => match occur {
                Occur::Must => self.execute_all_of(clauses),
                Occur::Should => {
                    let mut acc = RoaringBitmap::new();
                    for clause in clauses {
                        acc |= self.execute(clause)?;
                    }
                    Ok(acc)
                }
                Occur::MustNot => Err(Error::SpanMustNot),
            },
        }
    }

    fn execute_all_of(&self, clauses: &[ParseableQuery]) -> Result<RoaringBitmap, Error> {
        let mut acc: Option<RoaringBitmap> = None;
        for clause in clauses {
            let sub = self.execute(clause)?;
            acc = Some(match acc {
                Some(acc) => acc & sub,
                None => sub,
            });
        }
        Ok(acc.unwrap_or_default())
    }

    fn execute_range(
        &self,
        field: &str,
        field_type: FieldType,
        lower: Option<&str>,
        upper: Option<&str>,
        inclusive_lower: bool,
        inclusive_upper: bool,
    ) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        let Some(values) = self.typed_values.get(field) else {
            return out;
        };

        for (&doc_id, value) in values {
            if in_range(
                value,
                field_type,
                lower,
                upper,
                inclusive_lower,
                inclusive_upper,
            ) {
                out.insert(doc_id);
            }
        }
        out
    }

    /// Documents from `candidates` ordered by a typed field, the way the
    /// engine's native sort would deliver them. Documents lacking the field
    /// sort last.
    pub fn sorted_docs(&self, candidates: &RoaringBitmap, sort: &SortSpec) -> Vec<DocId> {
        let values = self.typed_values.get(&sort.field);
        let mut docs: Vec<DocId> = candidates.iter().collect();
        docs.sort_by(|&a, &b| {
            let va = values.and_then(|v| v.get(&a));
            let vb = values.and_then(|v| v.get(&b));
            let ord = match (va, vb) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(_), None) => std::cmp::Ordering::Less,
                (Some(a), Some(b)) => compare_typed(a, b, sort.field_type),
            };
            if sort.descending { ord.reverse() } else { ord }
        });
        docs
    }
}

impl StoredFields for MemoryIndex {
    fn stored(&self, doc: DocId) -> Option<&StoredDocument> {
        self.docs.get(doc as usize).map(|d| &d.stored)
    }
}

fn compare_typed(a: &str, b: &str, field_type: FieldType) -> std::cmp::Ordering {
    match field_type {
        FieldType::String => a.cmp(b),
        FieldType::Int => {
            let (a, b) = (a.parse::<i64>().ok(), b.parse::<i64>().ok());
            a.cmp(&b)
        }
        FieldType::Number => {
            let (a, b) = (a.parse::<f64>().ok(), b.parse::<f64>().ok());
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        }
    }
}

fn in_range(
    value: &str,
    field_type: FieldType,
    lower: Option<&str>,
    upper: Option<&str>,
    inclusive_lower: bool,
    inclusive_upper: bool,
) -> bool {
    use std::cmp::Ordering;

    let check = |bound: Option<&str>, inclusive: bool, want: Ordering| -> bool {
        match bound {
            None => true,
            Some(bound) => {
                let ord = compare_typed(value, bound, field_type);
                ord == want || (inclusive && ord == Ordering::Equal)
            }
        }
    };
    check(lower, inclusive_lower, Ordering::Greater)
        && check(upper, inclusive_upper, Ordering::Less)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{DocumentBuilder, QName};

    fn play(title: &str, year: &str) -> Document {
        let mut b = DocumentBuilder::new();
        b.start_element(QName::local("play"));
        b.start_element(QName::local("title"));
        b.text(title);
        b.end_element();
        b.start_element(QName::local("year"));
        b.text(year);
        b.end_element();
        b.end_element();
        b.build()
    }

    fn index() -> MemoryIndex {
        let config = IndexConfig::default().with_typed_field("year", FieldType::Int);
        let mut index = MemoryIndex::new(config);
        index.add_document("hamlet.xml", &play("Hamlet", "1603"));
        index.add_document("lear.xml", &play("King Lear", "1606"));
        index.add_document("tempest.xml", &play("The Tempest", "1611"));
        index
    }

    #[test]
    fn test_element_name_lookup() {
        let index = index();
        let hits = index
            .execute(&ParseableQuery::term("lux_elt_name", "title"))
            .unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_node_text_lookup() {
        let index = index();
        let hits = index
            .execute(&ParseableQuery::node_text("lux_elt_text", "title", "hamlet"))
            .unwrap();
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_document_text_lookup() {
        let index = index();
        let hits = index
            .execute(&ParseableQuery::term("lux_text", "tempest"))
            .unwrap();
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_boolean_must_not() {
        let index = index();
        let query = ParseableQuery::Boolean {
            clauses: vec![
                crate::query::pquery::Clause::new(
                    ParseableQuery::term("lux_elt_name", "play"),
                    Occur::Must,
                ),
                crate::query::pquery::Clause::new(
                    ParseableQuery::term("lux_text", "hamlet"),
                    Occur::MustNot,
                ),
            ],
        };
        let hits = index.execute(&query).unwrap();
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_range_query() {
        let index = index();
        let query = ParseableQuery::Range {
            field: "year".to_string(),
            field_type: FieldType::Int,
            lower: Some("1604".to_string()),
            upper: None,
            inclusive_lower: true,
            inclusive_upper: false,
        };
        let hits = index.execute(&query).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(!hits.contains(0));
    }

    #[test]
    fn test_span_as_conjunction() {
        let index = index();
        let query = ParseableQuery::phrase(vec![
            ParseableQuery::term("lux_text", "king"),
            ParseableQuery::term("lux_text", "lear"),
        ]);
        let hits = index.execute(&query).unwrap();
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_sorted_docs() {
        let index = index();
        let sort = SortSpec {
            field: "year".to_string(),
            field_type: FieldType::Int,
            descending: true,
        };
        let docs = index.sorted_docs(&index.all_docs(), &sort);
        assert_eq!(docs, vec![2, 1, 0]);
    }

    #[test]
    fn test_path_field() {
        let index = index();
        let hits = index
            .execute(&ParseableQuery::term("lux_path", "/play/title"))
            .unwrap();
        assert_eq!(hits.len(), 3);
    }
}
