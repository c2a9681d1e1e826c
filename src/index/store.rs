//! Stored-document access.
//!
//! Indexed documents are stored either as binary tree buffers or as raw
//! XML text (an index-build-time choice). The store fronts decoding with an
//! LRU cache so repeated retrieval of the same document does not re-decode
//! its buffer. All decode state is per call; nothing here is shared between
//! concurrent queries except the cache its owner chooses to share.

use std::num::NonZeroUsize;

use anyhow::{bail, Context, Result};
use lru::LruCache;

use crate::codec;
use crate::index::memory::DocId;
use crate::query::collector::{DocumentPayload, DocumentSource};
use crate::tree::Document;

/// A document as written into the index's stored field.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredDocument {
    BinaryTree(Vec<u8>),
    RawXml(String),
}

/// Anything that can hand back the stored form of a document.
pub trait StoredFields {
    fn stored(&self, doc: DocId) -> Option<&StoredDocument>;
}

/// Default number of decoded documents kept around.
const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Retrieves and materializes stored documents.
pub struct DocumentStore<'a, S: StoredFields> {
    source: &'a S,
    cache: LruCache<DocId, Document>,
}

impl<'a, S: StoredFields> DocumentStore<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self::with_capacity(source, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(source: &'a S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is non-zero");
        Self {
            source,
            cache: LruCache::new(capacity),
        }
    }
}

impl<S: StoredFields> DocumentSource for DocumentStore<'_, S> {
    fn load(&mut self, doc_id: DocId) -> Result<DocumentPayload> {
        let Some(stored) = self.source.stored(doc_id) else {
            bail!("no stored document for doc {doc_id}");
        };
        match stored {
            // Raw XML goes back as text; parsing it is the reader's job.
            StoredDocument::RawXml(text) => Ok(DocumentPayload::Xml(text.clone())),
            StoredDocument::BinaryTree(bytes) => {
                if let Some(doc) = self.cache.get(&doc_id) {
                    return Ok(DocumentPayload::Tree(doc.clone()));
                }
                let doc = codec::decode(bytes)
                    .with_context(|| format!("decoding stored tree for doc {doc_id}"))?;
                self.cache.put(doc_id, doc.clone());
                Ok(DocumentPayload::Tree(doc))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{DocumentBuilder, QName};
    use ahash::AHashMap;

    struct MapFields {
        map: AHashMap<DocId, StoredDocument>,
    }

    impl StoredFields for MapFields {
        fn stored(&self, doc: DocId) -> Option<&StoredDocument> {
            self.map.get(&doc)
        }
    }

    fn sample_doc() -> Document {
        let mut b = DocumentBuilder::new();
        b.start_element(QName::local("title"));
        b.text("Hamlet");
        b.end_element();
        b.build()
    }

    #[test]
    fn test_load_binary() {
        let doc = sample_doc();
        let mut map = AHashMap::new();
        map.insert(0, StoredDocument::BinaryTree(codec::encode(&doc)));
        let fields = MapFields { map };
        let mut store = DocumentStore::new(&fields);

        let payload = store.load(0).unwrap();
        assert_eq!(payload, DocumentPayload::Tree(doc.clone()));
        // Second load hits the cache and must agree.
        assert_eq!(store.load(0).unwrap(), DocumentPayload::Tree(doc));
    }

    #[test]
    fn test_load_raw_xml() {
        let mut map = AHashMap::new();
        map.insert(3, StoredDocument::RawXml("<title>Hamlet</title>".to_string()));
        let fields = MapFields { map };
        let mut store = DocumentStore::new(&fields);
        assert_eq!(
            store.load(3).unwrap(),
            DocumentPayload::Xml("<title>Hamlet</title>".to_string())
        );
    }

    #[test]
    fn test_missing_document() {
        let fields = MapFields {
            map: AHashMap::new(),
        };
        let mut store = DocumentStore::new(&fields);
        assert!(store.load(9).is_err());
    }

    #[test]
    fn test_corrupt_buffer_is_hard_error() {
        let mut map = AHashMap::new();
        map.insert(0, StoredDocument::BinaryTree(vec![1, 2, 3]));
        let fields = MapFields { map };
        let mut store = DocumentStore::new(&fields);
        let err = store.load(0).unwrap_err();
        assert!(err.to_string().contains("doc 0"));
    }
}
