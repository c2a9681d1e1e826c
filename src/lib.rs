//! # xqi: XPath over full-text indexes
//!
//! xqi integrates an XPath/XQuery front end with a full-text search index:
//! expressions are partially evaluated as index queries that retrieve only
//! the documents that could possibly satisfy them, and evaluation finishes
//! against that candidate subset.
//!
//! ## Architecture
//!
//! - [`query`] - the query tree, string/XML rendering, grammar parsing,
//!   XPath compilation, and result collection
//! - [`xpath`] - the expression AST the compiler consumes
//! - [`index`] - field-naming configuration, an in-memory index
//!   collaborator, and stored-document access
//! - [`tree`] - the in-memory document model
//! - [`codec`] - the compact binary document serialization
//! - [`utils`] - text analysis and integer encoding primitives
//!
//! ## Quick start
//!
//! ```
//! use xqi::index::{DocumentStore, IndexConfig, MemoryIndex};
//! use xqi::query::{Bindings, Collector, Compiler, Translation};
//! use xqi::tree::{DocumentBuilder, QName};
//! use xqi::xpath::parse_xpath;
//!
//! let mut index = MemoryIndex::new(IndexConfig::default());
//! let mut builder = DocumentBuilder::new();
//! builder.start_element(QName::local("title"));
//! builder.text("Hamlet");
//! builder.end_element();
//! index.add_document("hamlet.xml", &builder.build());
//!
//! let config = index.config().clone();
//! let bindings = Bindings::new();
//! let expr = parse_xpath("exists(//title)").unwrap();
//! let Translation::Query(compiled) =
//!     Compiler::new(&config, &bindings).compile(&expr).unwrap()
//! else {
//!     unreachable!()
//! };
//!
//! let candidates = index.execute(&compiled.query).unwrap();
//! let mut store = DocumentStore::new(&index);
//! let result = Collector::all()
//!     .collect(&compiled, candidates.iter(), &mut store)
//!     .unwrap();
//! assert_eq!(result.outcome, xqi::query::Outcome::Boolean(true));
//! ```

pub mod codec;
pub mod error;
pub mod index;
pub mod output;
pub mod query;
pub mod tree;
pub mod utils;
pub mod xpath;

pub use error::Error;
