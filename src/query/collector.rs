//! Result collection and the short-circuit protocol.
//!
//! The collector consumes document ids in whatever order the index
//! delivers them and decides, per match, whether to keep scanning. The
//! decision is an explicit [`Flow`] value, never an unwound exception,
//! and the final [`Termination`] tells the caller whether the scan ran dry
//! or stopped early because the answer was already determined.
//!
//! Strategy is chosen from the compiled facts:
//!
//! - boolean facts with `MINIMAL`: the first hit settles the answer;
//! - `COUNTING` with `MINIMAL`: count every match, retrieve nothing;
//! - otherwise: paginate. Matches before `start` are counted but never
//!   deserialized; collection stops once the page is full.
//!
//! Boolean or counting facts *without* `MINIMAL` mean the query is only a
//! superset of the answer, so those degrade to document retrieval and the
//! expression engine finishes the job.

use anyhow::Result;

use crate::query::compiler::CompiledQuery;
use crate::tree::Document;

/// A stored document as handed back by the store: either a decoded tree or
/// raw XML text for the external reader to parse.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentPayload {
    Tree(Document),
    Xml(String),
}

/// Source of stored documents, addressed by document id.
///
/// Failures here are hard errors: a document that matched but cannot be
/// read aborts the whole query.
pub trait DocumentSource {
    fn load(&mut self, doc_id: u32) -> Result<DocumentPayload>;
}

/// Per-match control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop(StopReason),
}

/// Why collection stopped before exhausting the postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An existence answer was determined by the first hit.
    AnswerDetermined,
    /// The requested page is full.
    PageFilled,
}

/// How the scan ended. Stopping early is a normal outcome, distinct from
/// any error raised while loading documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exhausted,
    ShortCircuited(StopReason),
}

/// A retrieved document within the requested window.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub doc_id: u32,
    pub payload: DocumentPayload,
}

/// The answer shape, per the compiled facts.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Documents(Vec<Retrieved>),
    Count(u64),
    Boolean(bool),
}

/// Everything the caller needs to know about a finished scan.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectResult {
    pub outcome: Outcome,
    pub termination: Termination,
    /// Matches seen, including skipped and post-page ones.
    pub matched: u64,
}

/// Drives postings through the strategy selected by the compiled facts.
#[derive(Debug, Clone, Copy)]
pub struct Collector {
    /// 1-based offset of the first document to retrieve.
    start: u64,
    /// Page size; `None` collects everything.
    size: Option<usize>,
}

impl Collector {
    /// Collect every matching document.
    pub fn all() -> Self {
        Self {
            start: 1,
            size: None,
        }
    }

    /// Collect a page: `start` is 1-based, `size` the number of documents.
    pub fn page(start: u64, size: usize) -> Self {
        Self {
            start: start.max(1),
            size: Some(size),
        }
    }

    pub fn collect<S, I>(
        &self,
        compiled: &CompiledQuery,
        postings: I,
        source: &mut S,
    ) -> Result<CollectResult>
    where
        S: DocumentSource,
        I: IntoIterator<Item = u32>,
    {
        let facts = &compiled.facts;

        if facts.is_boolean() && facts.is_minimal() {
            return Ok(self.collect_boolean(compiled, postings));
        }
        if facts.is_counting() && facts.is_minimal() {
            return Ok(self.collect_count(postings));
        }
        self.collect_documents(postings, source)
    }

    fn collect_boolean<I>(&self, compiled: &CompiledQuery, postings: I) -> CollectResult
    where
        I: IntoIterator<Item = u32>,
    {
        let on_hit = compiled.facts.boolean_on_hit();
        for _doc in postings {
            return CollectResult {
                outcome: Outcome::Boolean(on_hit),
                termination: Termination::ShortCircuited(StopReason::AnswerDetermined),
                matched: 1,
            };
        }
        CollectResult {
            outcome: Outcome::Boolean(!on_hit),
            termination: Termination::Exhausted,
            matched: 0,
        }
    }

    fn collect_count<I>(&self, postings: I) -> CollectResult
    where
        I: IntoIterator<Item = u32>,
    {
        let mut count = 0u64;
        for _doc in postings {
            count += 1;
        }
        CollectResult {
            outcome: Outcome::Count(count),
            termination: Termination::Exhausted,
            matched: count,
        }
    }

    fn collect_documents<S, I>(&self, postings: I, source: &mut S) -> Result<CollectResult>
    where
        S: DocumentSource,
        I: IntoIterator<Item = u32>,
    {
        let mut results = Vec::new();
        let mut matched = 0u64;
        let mut termination = Termination::Exhausted;

        for doc_id in postings {
            matched += 1;
            match self.on_match(doc_id, matched, &mut results, source)? {
                Flow::Continue => {}
                Flow::Stop(reason) => {
                    termination = Termination::ShortCircuited(reason);
                    break;
                }
            }
        }

        Ok(CollectResult {
            outcome: Outcome::Documents(results),
            termination,
            matched,
        })
    }

    fn on_match<S: DocumentSource>(
        &self,
        doc_id: u32,
        matched: u64,
        results: &mut Vec<Retrieved>,
        source: &mut S,
    ) -> Result<Flow> {
        // Skipped documents are counted, never deserialized.
        if matched < self.start {
            return Ok(Flow::Continue);
        }
        if let Some(size) = self.size {
            if results.len() >= size {
                return Ok(Flow::Stop(StopReason::PageFilled));
            }
        }
        results.push(Retrieved {
            doc_id,
            payload: source.load(doc_id)?,
        });
        Ok(Flow::Continue)
    }
}
