//! End-to-end coverage: index documents, compile XPath, execute against
//! the in-memory index, collect with short-circuiting, and retrieve
//! through the codec-backed store.

use xqi::index::{
    DocumentStorage, DocumentStore, FieldType, IndexConfig, MemoryIndex,
};
use xqi::query::collector::{DocumentPayload, Outcome, StopReason, Termination};
use xqi::query::{Bindings, CompiledQuery, Collector, Compiler, Translation};
use xqi::tree::{Attribute, Document, DocumentBuilder, NamespaceDecl, QName};
use xqi::xpath::parse_xpath;

fn play(title: &str, year: &str, speeches: &[(&str, &str)]) -> Document {
    let mut b = DocumentBuilder::new();
    b.start_element(QName::local("play"));
    b.start_element(QName::local("title"));
    b.text(title);
    b.end_element();
    b.start_element(QName::local("year"));
    b.text(year);
    b.end_element();
    for (speaker, line) in speeches {
        b.start_element_full(
            QName::local("speech"),
            vec![Attribute::new(QName::local("speaker"), *speaker)],
            vec![],
        );
        b.start_element(QName::local("line"));
        b.text(*line);
        b.end_element();
        b.end_element();
    }
    b.end_element();
    b.build()
}

fn corpus(storage: DocumentStorage) -> MemoryIndex {
    let config = IndexConfig {
        storage,
        ..IndexConfig::default()
    }
    .with_typed_field("year", FieldType::Int);

    let mut index = MemoryIndex::new(config);
    index.add_document(
        "hamlet.xml",
        &play(
            "Hamlet",
            "1603",
            &[
                ("HAMLET", "To be, or not to be, that is the question"),
                ("OPHELIA", "Good my lord, how does your honour"),
            ],
        ),
    );
    index.add_document(
        "lear.xml",
        &play(
            "King Lear",
            "1606",
            &[("LEAR", "Blow, winds, and crack your cheeks")],
        ),
    );
    index.add_document(
        "tempest.xml",
        &play(
            "The Tempest",
            "1611",
            &[("PROSPERO", "We are such stuff as dreams are made on")],
        ),
    );
    index
}

fn compile(index: &MemoryIndex, xpath: &str) -> CompiledQuery {
    let bindings = Bindings::new();
    let expr = parse_xpath(xpath).expect("xpath parses");
    match Compiler::new(index.config(), &bindings)
        .compile(&expr)
        .expect("compiles")
    {
        Translation::Query(c) => c,
        Translation::FullScan => panic!("{xpath} should be translatable"),
    }
}

#[test]
fn existence_short_circuits_without_retrieval() {
    let index = corpus(DocumentStorage::BinaryTree);
    let compiled = compile(&index, "exists(//title)");
    assert!(compiled.facts.is_minimal());

    let candidates = index.execute(&compiled.query).unwrap();
    assert_eq!(candidates.len(), 3);

    let mut store = DocumentStore::new(&index);
    let result = Collector::all()
        .collect(&compiled, candidates.iter(), &mut store)
        .unwrap();

    assert_eq!(result.outcome, Outcome::Boolean(true));
    assert_eq!(
        result.termination,
        Termination::ShortCircuited(StopReason::AnswerDetermined)
    );
    assert_eq!(result.matched, 1);
}

#[test]
fn negated_existence_answers_true_on_no_hits() {
    let index = corpus(DocumentStorage::BinaryTree);
    let compiled = compile(&index, "not(exists(//chorus))");
    assert!(!compiled.facts.boolean_on_hit());

    let candidates = index.execute(&compiled.query).unwrap();
    assert!(candidates.is_empty());

    let mut store = DocumentStore::new(&index);
    let result = Collector::all()
        .collect(&compiled, candidates.iter(), &mut store)
        .unwrap();
    assert_eq!(result.outcome, Outcome::Boolean(true));
    assert_eq!(result.termination, Termination::Exhausted);
}

#[test]
fn counting_runs_to_exhaustion() {
    let index = corpus(DocumentStorage::BinaryTree);
    let compiled = compile(&index, "count(//speech)");
    assert!(compiled.facts.is_counting());
    assert!(compiled.facts.is_minimal());

    let candidates = index.execute(&compiled.query).unwrap();
    let mut store = DocumentStore::new(&index);
    let result = Collector::all()
        .collect(&compiled, candidates.iter(), &mut store)
        .unwrap();

    // Document-level counting: every play has speeches.
    assert_eq!(result.outcome, Outcome::Count(3));
    assert_eq!(result.termination, Termination::Exhausted);
}

#[test]
fn scoped_text_narrows_to_one_document() {
    let index = corpus(DocumentStorage::BinaryTree);
    let compiled = compile(&index, "//title[contains(., 'Tempest')]");

    let candidates = index.execute(&compiled.query).unwrap();
    assert_eq!(candidates.len(), 1);

    let mut store = DocumentStore::new(&index);
    let result = Collector::all()
        .collect(&compiled, candidates.iter(), &mut store)
        .unwrap();
    let Outcome::Documents(docs) = result.outcome else {
        panic!("expected documents");
    };
    assert_eq!(docs.len(), 1);
    let DocumentPayload::Tree(doc) = &docs[0].payload else {
        panic!("expected decoded tree");
    };
    assert!(doc.text(Document::ROOT).contains("dreams"));
    assert_eq!(index.uri(docs[0].doc_id), Some("tempest.xml"));
}

#[test]
fn attribute_equality_finds_speaker() {
    let index = corpus(DocumentStorage::BinaryTree);
    let compiled = compile(&index, "//speech[@speaker = 'LEAR']");

    let candidates = index.execute(&compiled.query).unwrap();
    let ids: Vec<u32> = candidates.iter().collect();
    assert_eq!(ids, vec![1]);
}

#[test]
fn typed_range_filters_by_year() {
    let index = corpus(DocumentStorage::BinaryTree);
    let compiled = compile(&index, "//play[year >= 1605]");

    let candidates = index.execute(&compiled.query).unwrap();
    let ids: Vec<u32> = candidates.iter().collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn pagination_skips_without_decoding() {
    let index = corpus(DocumentStorage::BinaryTree);
    let compiled = compile(&index, "//play");

    let candidates = index.execute(&compiled.query).unwrap();
    let mut store = DocumentStore::new(&index);
    let result = Collector::page(2, 1)
        .collect(&compiled, candidates.iter(), &mut store)
        .unwrap();

    let Outcome::Documents(docs) = &result.outcome else {
        panic!("expected documents");
    };
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].doc_id, 1);
    assert_eq!(
        result.termination,
        Termination::ShortCircuited(StopReason::PageFilled)
    );
}

#[test]
fn raw_xml_storage_roundtrips_text() {
    let index = corpus(DocumentStorage::RawXml);
    let compiled = compile(&index, "//title[contains(., 'Hamlet')]");

    let candidates = index.execute(&compiled.query).unwrap();
    let mut store = DocumentStore::new(&index);
    let result = Collector::all()
        .collect(&compiled, candidates.iter(), &mut store)
        .unwrap();

    let Outcome::Documents(docs) = result.outcome else {
        panic!("expected documents");
    };
    let DocumentPayload::Xml(text) = &docs[0].payload else {
        panic!("expected raw xml");
    };
    assert!(text.contains("<title>Hamlet</title>"));
}

#[test]
fn untranslatable_expressions_fall_back() {
    let index = corpus(DocumentStorage::BinaryTree);
    let bindings = Bindings::new();
    let expr = parse_xpath("//*[local:weird(.)]").unwrap();
    let translation = Compiler::new(index.config(), &bindings)
        .compile(&expr)
        .unwrap();
    assert_eq!(translation, Translation::FullScan);

    // The fallback path evaluates over every document.
    assert_eq!(index.all_docs().len(), 3);
}

#[test]
fn namespaced_documents_index_and_query() {
    let config = IndexConfig::default();
    let mut index = MemoryIndex::new(config);

    let tei = "http://www.tei-c.org/ns/1.0";
    let mut b = DocumentBuilder::new();
    b.start_element_full(
        QName::new("TEI", tei, "tei"),
        vec![],
        vec![NamespaceDecl::new("tei", tei)],
    );
    b.start_element(QName::new("title", tei, "tei"));
    b.text("Sonnets");
    b.end_element();
    b.end_element();
    index.add_document("sonnets.xml", &b.build());

    let mut bindings = Bindings::new();
    bindings.bind("t", tei);
    let expr = parse_xpath("exists(//t:title)").unwrap();
    let Translation::Query(compiled) = Compiler::new(index.config(), &bindings)
        .compile(&expr)
        .unwrap()
    else {
        panic!("expected query");
    };

    let candidates = index.execute(&compiled.query).unwrap();
    assert_eq!(candidates.len(), 1);

    // A different prefix bound to the same URI matches the same terms.
    let mut other = Bindings::new();
    other.bind("x", tei);
    let expr = parse_xpath("exists(//x:title)").unwrap();
    let Translation::Query(same) = Compiler::new(index.config(), &other)
        .compile(&expr)
        .unwrap()
    else {
        panic!("expected query");
    };
    assert_eq!(same.query, compiled.query);
}

#[test]
fn stored_tree_traversal_is_indistinguishable() {
    let index = corpus(DocumentStorage::BinaryTree);
    let original = play(
        "Hamlet",
        "1603",
        &[
            ("HAMLET", "To be, or not to be, that is the question"),
            ("OPHELIA", "Good my lord, how does your honour"),
        ],
    );

    let mut store = DocumentStore::new(&index);
    let compiled = compile(&index, "//title[contains(., 'Hamlet')]");
    let candidates = index.execute(&compiled.query).unwrap();
    let result = Collector::all()
        .collect(&compiled, candidates.iter(), &mut store)
        .unwrap();

    let Outcome::Documents(docs) = result.outcome else {
        panic!("expected documents");
    };
    let DocumentPayload::Tree(decoded) = &docs[0].payload else {
        panic!("expected tree");
    };
    assert_eq!(decoded, &original);
}
