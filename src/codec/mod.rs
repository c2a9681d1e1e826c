//! Compact binary serialization of document trees.
//!
//! Stored documents round-trip structurally: node kinds, names, namespaces,
//! attributes, text content, and document order are all preserved. Byte
//! stability is NOT guaranteed: re-encoding a decoded tree may order its
//! dictionaries differently. A version byte in the header selects the decode
//! path so old buffers stay readable.
//!
//! Buffer layout (version 1), after the 4-byte `XQTB` signature and version
//! byte, a fixed header of little-endian u32 counts (nodes, attributes,
//! namespace declarations, name dictionary, string dictionary, value
//! dictionary, character buffer length), then the sections:
//!
//! 1.  node kinds, one byte each, in document order
//! 2.  node depths, varint each
//! 3.  next-sibling pointers (+1, 0 = none), varint each
//! 4.  name codes (0 = unnamed node), varint each
//! 5.  alpha: text/comment offset (delta), attribute-chain head (delta,
//!     0 = none), PI target name code (kind-dependent)
//! 6.  beta: text/comment length, namespace-chain head (delta, 0 = none),
//!     PI data value index (kind-dependent)
//! 7.  attribute parent ids (delta), name codes, value indices
//! 8.  namespace parent ids (delta), prefix indices, uri indices
//! 9.  name dictionary: packed local/prefix/uri string indices, varint u64
//! 10. string dictionary, length-prefixed UTF-8
//! 11. attribute-value dictionary, length-prefixed UTF-8
//! 12. character buffer (all text and comment content, document order)

use crate::error::Error;
use crate::tree::{Attribute, Document, DocumentBuilder, NamespaceDecl, NodeKind, QName};
use crate::utils::encoding::{
    decode_varint, decode_varint_u64, delta_decode, delta_encode, encode_varint,
    encode_varint_u64, read_u32_le, write_u32_le,
};
use rustc_hash::FxHashMap;

/// Buffer signature.
const SIGNATURE: &[u8; 4] = b"XQTB";

/// Current encoder version.
const VERSION: u8 = 1;

/// Node kind codes.
const KIND_DOCUMENT: u8 = 0;
const KIND_ELEMENT: u8 = 1;
const KIND_TEXT: u8 = 2;
const KIND_COMMENT: u8 = 3;
const KIND_PI: u8 = 4;

/// Bit widths for packing a name's string-dictionary indices into one code.
const NAME_SHIFT_PREFIX: u32 = 20;
const NAME_SHIFT_URI: u32 = 40;
const NAME_INDEX_MASK: u64 = (1 << NAME_SHIFT_PREFIX) - 1;

/// Encode a document tree into a standalone buffer.
pub fn encode(doc: &Document) -> Vec<u8> {
    let mut enc = Encoder::default();
    enc.run(doc)
}

/// Decode a buffer produced by [`encode`].
///
/// Any structural problem (bad signature, unknown version, truncation,
/// out-of-range indices) is a hard [`Error::Corrupt`]; there is no partial
/// decode. Decoding holds no shared state and is safe to run concurrently
/// over independent buffers.
pub fn decode(buf: &[u8]) -> Result<Document, Error> {
    if buf.len() < SIGNATURE.len() + 1 {
        return Err(Error::corrupt("buffer shorter than header"));
    }
    if &buf[..4] != SIGNATURE {
        return Err(Error::corrupt("bad signature"));
    }
    match buf[4] {
        1 => decode_v1(&buf[5..]),
        other => Err(Error::corrupt(format!("unsupported version {other}"))),
    }
}

/// String interner assigning 1-based indices; 0 is reserved for null/empty.
#[derive(Default)]
struct Interner {
    table: FxHashMap<String, u32>,
    strings: Vec<String>,
}

impl Interner {
    fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        if let Some(&idx) = self.table.get(s) {
            return idx;
        }
        self.strings.push(s.to_string());
        let idx = self.strings.len() as u32;
        self.table.insert(s.to_string(), idx);
        idx
    }
}

#[derive(Default)]
struct Encoder {
    strings: Interner,
    values: Interner,
    /// Packed name code -> 1-based name dictionary index.
    name_table: FxHashMap<u64, u32>,
    names: Vec<u64>,
}

impl Encoder {
    fn name_code(&mut self, name: &QName) -> u32 {
        let local = self.strings.intern(&name.local) as u64;
        let prefix = self.strings.intern(&name.prefix) as u64;
        let uri = self.strings.intern(&name.namespace_uri) as u64;
        let packed = local | (prefix << NAME_SHIFT_PREFIX) | (uri << NAME_SHIFT_URI);

        if let Some(&idx) = self.name_table.get(&packed) {
            return idx;
        }
        self.names.push(packed);
        let idx = self.names.len() as u32;
        self.name_table.insert(packed, idx);
        idx
    }

    fn run(&mut self, doc: &Document) -> Vec<u8> {
        let node_count = doc.len();

        let mut kinds = Vec::with_capacity(node_count);
        let mut depths = Vec::new();
        let mut nexts = Vec::new();
        let mut name_codes = Vec::new();
        let mut alphas = Vec::new();
        let mut betas = Vec::new();

        let mut attr_parent_ids: Vec<u32> = Vec::new();
        let mut attr_names = Vec::new();
        let mut attr_values = Vec::new();
        let mut ns_parent_ids: Vec<u32> = Vec::new();
        let mut ns_prefixes = Vec::new();
        let mut ns_uris = Vec::new();

        let mut chars = String::new();

        // Delta state for the monotone per-kind sequences.
        let mut prev_text_off = 0u32;
        let mut prev_comment_off = 0u32;
        let mut prev_attr_head = 0u32;
        let mut prev_ns_head = 0u32;

        for id in doc.ids() {
            let node = doc.node(id);
            encode_varint(node.depth, &mut depths);
            encode_varint(node.next_sibling.map_or(0, |n| n + 1), &mut nexts);

            match &node.kind {
                NodeKind::Document => {
                    kinds.push(KIND_DOCUMENT);
                    encode_varint(0, &mut name_codes);
                    encode_varint(0, &mut alphas);
                    encode_varint(0, &mut betas);
                }
                NodeKind::Element {
                    name,
                    attributes,
                    namespaces,
                } => {
                    kinds.push(KIND_ELEMENT);
                    let code = self.name_code(name);
                    encode_varint(code, &mut name_codes);

                    // Attribute-chain head: 1-based index of this element's
                    // first attribute; heads strictly increase across the
                    // document, so non-zero heads delta-encode cleanly.
                    if attributes.is_empty() {
                        encode_varint(0, &mut alphas);
                    } else {
                        let head = attr_parent_ids.len() as u32 + 1;
                        encode_varint(head - prev_attr_head, &mut alphas);
                        prev_attr_head = head;
                    }
                    if namespaces.is_empty() {
                        encode_varint(0, &mut betas);
                    } else {
                        let head = ns_parent_ids.len() as u32 + 1;
                        encode_varint(head - prev_ns_head, &mut betas);
                        prev_ns_head = head;
                    }

                    for attr in attributes {
                        attr_parent_ids.push(id);
                        let code = self.name_code(&attr.name);
                        encode_varint(code, &mut attr_names);
                        encode_varint(self.values.intern(&attr.value), &mut attr_values);
                    }
                    for ns in namespaces {
                        ns_parent_ids.push(id);
                        encode_varint(self.strings.intern(&ns.prefix), &mut ns_prefixes);
                        encode_varint(self.strings.intern(&ns.uri), &mut ns_uris);
                    }
                }
                NodeKind::Text { content } => {
                    kinds.push(KIND_TEXT);
                    encode_varint(0, &mut name_codes);
                    let offset = chars.len() as u32;
                    encode_varint(offset - prev_text_off, &mut alphas);
                    prev_text_off = offset;
                    encode_varint(content.len() as u32, &mut betas);
                    chars.push_str(content);
                }
                NodeKind::Comment { content } => {
                    kinds.push(KIND_COMMENT);
                    encode_varint(0, &mut name_codes);
                    let offset = chars.len() as u32;
                    encode_varint(offset - prev_comment_off, &mut alphas);
                    prev_comment_off = offset;
                    encode_varint(content.len() as u32, &mut betas);
                    chars.push_str(content);
                }
                NodeKind::ProcessingInstruction { target, data } => {
                    kinds.push(KIND_PI);
                    encode_varint(0, &mut name_codes);
                    let target_code = self.name_code(&QName::local(target.clone()));
                    encode_varint(target_code, &mut alphas);
                    let data_idx = match data {
                        Some(d) => self.values.intern(d),
                        None => 0,
                    };
                    encode_varint(data_idx, &mut betas);
                }
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(SIGNATURE);
        out.push(VERSION);
        write_u32_le(node_count as u32, &mut out);
        write_u32_le(attr_parent_ids.len() as u32, &mut out);
        write_u32_le(ns_parent_ids.len() as u32, &mut out);
        write_u32_le(self.names.len() as u32, &mut out);
        write_u32_le(self.strings.strings.len() as u32, &mut out);
        write_u32_le(self.values.strings.len() as u32, &mut out);
        write_u32_le(chars.len() as u32, &mut out);

        out.extend_from_slice(&kinds);
        out.extend_from_slice(&depths);
        out.extend_from_slice(&nexts);
        out.extend_from_slice(&name_codes);
        out.extend_from_slice(&alphas);
        out.extend_from_slice(&betas);
        delta_encode(&attr_parent_ids, &mut out);
        out.extend_from_slice(&attr_names);
        out.extend_from_slice(&attr_values);
        delta_encode(&ns_parent_ids, &mut out);
        out.extend_from_slice(&ns_prefixes);
        out.extend_from_slice(&ns_uris);

        for &packed in &self.names {
            encode_varint_u64(packed, &mut out);
        }
        write_dict(&self.strings.strings, &mut out);
        write_dict(&self.values.strings, &mut out);
        out.extend_from_slice(chars.as_bytes());

        out
    }
}

fn write_dict(strings: &[String], out: &mut Vec<u8>) {
    for s in strings {
        encode_varint(s.len() as u32, out);
        out.extend_from_slice(s.as_bytes());
    }
}

/// Reading cursor that turns truncation into [`Error::Corrupt`].
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u32_le(&mut self) -> Result<u32, Error> {
        let v = read_u32_le(&self.buf[self.pos.min(self.buf.len())..])
            .ok_or_else(|| Error::corrupt("truncated header"))?;
        self.pos += 4;
        Ok(v)
    }

    fn varint(&mut self) -> Result<u32, Error> {
        let (v, n) = decode_varint(&self.buf[self.pos.min(self.buf.len())..])
            .ok_or_else(|| Error::corrupt("truncated varint"))?;
        self.pos += n;
        Ok(v)
    }

    fn varint_u64(&mut self) -> Result<u64, Error> {
        let (v, n) = decode_varint_u64(&self.buf[self.pos.min(self.buf.len())..])
            .ok_or_else(|| Error::corrupt("truncated varint"))?;
        self.pos += n;
        Ok(v)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&e| e <= self.buf.len())
            .ok_or_else(|| Error::corrupt("truncated section"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn varints(&mut self, count: usize) -> Result<Vec<u32>, Error> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.varint()?);
        }
        Ok(out)
    }

    /// A delta-encoded non-decreasing sequence, returned as absolute values.
    fn deltas(&mut self, count: usize) -> Result<Vec<u32>, Error> {
        let (values, used) = delta_decode(&self.buf[self.pos.min(self.buf.len())..], count)
            .ok_or_else(|| Error::corrupt("truncated delta sequence"))?;
        self.pos += used;
        Ok(values)
    }
}

/// 1-based dictionary lookup; 0 means empty/null.
fn dict_get(dict: &[String], idx: u32, what: &str) -> Result<String, Error> {
    if idx == 0 {
        return Ok(String::new());
    }
    dict.get(idx as usize - 1)
        .cloned()
        .ok_or_else(|| Error::corrupt(format!("{what} index {idx} out of range")))
}

fn unpack_name(
    packed: u64,
    strings: &[String],
) -> Result<QName, Error> {
    let local = dict_get(strings, (packed & NAME_INDEX_MASK) as u32, "local name")?;
    let prefix = dict_get(
        strings,
        ((packed >> NAME_SHIFT_PREFIX) & NAME_INDEX_MASK) as u32,
        "prefix",
    )?;
    let uri = dict_get(
        strings,
        ((packed >> NAME_SHIFT_URI) & NAME_INDEX_MASK) as u32,
        "namespace uri",
    )?;
    Ok(QName::new(local, uri, prefix))
}

fn decode_v1(buf: &[u8]) -> Result<Document, Error> {
    let mut cur = Cursor::new(buf);

    let node_count = cur.u32_le()? as usize;
    let attr_count = cur.u32_le()? as usize;
    let ns_count = cur.u32_le()? as usize;
    let name_count = cur.u32_le()? as usize;
    let string_count = cur.u32_le()? as usize;
    let value_count = cur.u32_le()? as usize;
    let char_len = cur.u32_le()? as usize;

    if node_count == 0 {
        return Err(Error::corrupt("document node missing"));
    }

    let kinds = cur.bytes(node_count)?.to_vec();
    let depths = cur.varints(node_count)?;
    let nexts = cur.varints(node_count)?;
    let name_codes = cur.varints(node_count)?;
    let alphas = cur.varints(node_count)?;
    let betas = cur.varints(node_count)?;

    let attr_parents = cur.deltas(attr_count)?;
    let attr_names = cur.varints(attr_count)?;
    let attr_values = cur.varints(attr_count)?;
    let ns_parents = cur.deltas(ns_count)?;
    let ns_prefixes = cur.varints(ns_count)?;
    let ns_uris = cur.varints(ns_count)?;

    let mut packed_names = Vec::with_capacity(name_count);
    for _ in 0..name_count {
        packed_names.push(cur.varint_u64()?);
    }
    let strings = read_dict(&mut cur, string_count)?;
    let values = read_dict(&mut cur, value_count)?;

    let chars = std::str::from_utf8(cur.bytes(char_len)?)
        .map_err(|_| Error::corrupt("character buffer is not UTF-8"))?;

    let names: Vec<QName> = packed_names
        .iter()
        .map(|&packed| unpack_name(packed, &strings))
        .collect::<Result<_, _>>()?;

    if kinds[0] != KIND_DOCUMENT || depths[0] != 0 {
        return Err(Error::corrupt("first node is not the document node"));
    }

    // Group attributes and namespace declarations by their parent element.
    let attrs_by_parent =
        group_by_parent(&attr_parents, |i| -> Result<Attribute, Error> {
            let name = name_at(&names, attr_names[i], "attribute name")?;
            let value = dict_get(&values, attr_values[i], "attribute value")?;
            Ok(Attribute { name, value })
        })?;
    let ns_by_parent = group_by_parent(&ns_parents, |i| -> Result<NamespaceDecl, Error> {
        let prefix = dict_get(&strings, ns_prefixes[i], "namespace prefix")?;
        let uri = dict_get(&strings, ns_uris[i], "namespace uri")?;
        Ok(NamespaceDecl { prefix, uri })
    })?;

    // Rebuild through the public builder, tracking open elements by depth.
    let mut builder = DocumentBuilder::new();
    let mut open_depth = 0u32;
    let mut prev_text_off = 0u32;
    let mut prev_comment_off = 0u32;

    for id in 1..node_count {
        let depth = depths[id];
        if depth == 0 || depth > open_depth + 1 {
            return Err(Error::corrupt(format!("node {id} has invalid depth {depth}")));
        }
        while open_depth >= depth {
            builder.end_element();
            open_depth -= 1;
        }

        match kinds[id] {
            KIND_ELEMENT => {
                let name = name_at(&names, name_codes[id], "element name")?;
                let attrs = attrs_by_parent.get(&(id as u32)).cloned().unwrap_or_default();
                let nses = ns_by_parent.get(&(id as u32)).cloned().unwrap_or_default();
                builder.start_element_full(name, attrs, nses);
                open_depth += 1;
            }
            KIND_TEXT => {
                let offset = prev_text_off + alphas[id];
                prev_text_off = offset;
                builder.text(char_slice(chars, offset, betas[id])?);
            }
            KIND_COMMENT => {
                let offset = prev_comment_off + alphas[id];
                prev_comment_off = offset;
                builder.comment(char_slice(chars, offset, betas[id])?);
            }
            KIND_PI => {
                let target = name_at(&names, alphas[id], "pi target")?.local;
                let data = match betas[id] {
                    0 => None,
                    idx => Some(dict_get(&values, idx, "pi data")?),
                };
                builder.processing_instruction(target, data);
            }
            KIND_DOCUMENT => {
                return Err(Error::corrupt("nested document node"));
            }
            other => {
                return Err(Error::corrupt(format!("unknown node kind {other}")));
            }
        }
    }
    while open_depth > 0 {
        builder.end_element();
        open_depth -= 1;
    }

    let doc = builder.build();

    // The stored next-sibling pointers are redundant with the depth array;
    // disagreement means the buffer is damaged.
    for id in doc.ids() {
        let stored = nexts[id as usize];
        let actual = doc.node(id).next_sibling.map_or(0, |n| n + 1);
        if stored != actual {
            return Err(Error::corrupt(format!(
                "sibling pointer mismatch at node {id}"
            )));
        }
    }

    Ok(doc)
}

fn read_dict(cur: &mut Cursor<'_>, count: usize) -> Result<Vec<String>, Error> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let len = cur.varint()? as usize;
        let bytes = cur.bytes(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::corrupt("dictionary entry is not UTF-8"))?;
        out.push(s.to_string());
    }
    Ok(out)
}

fn name_at(names: &[QName], code: u32, what: &str) -> Result<QName, Error> {
    if code == 0 {
        return Err(Error::corrupt(format!("missing {what}")));
    }
    names
        .get(code as usize - 1)
        .cloned()
        .ok_or_else(|| Error::corrupt(format!("{what} code {code} out of range")))
}

fn char_slice(chars: &str, offset: u32, len: u32) -> Result<&str, Error> {
    let start = offset as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or_else(|| Error::corrupt("character range overflow"))?;
    chars
        .get(start..end)
        .ok_or_else(|| Error::corrupt("character range out of bounds"))
}

/// Collect each parent's run of items.
fn group_by_parent<T, F>(
    parents: &[u32],
    mut item: F,
) -> Result<ahash::AHashMap<u32, Vec<T>>, Error>
where
    F: FnMut(usize) -> Result<T, Error>,
{
    let mut by_parent: ahash::AHashMap<u32, Vec<T>> = ahash::AHashMap::new();
    for (i, &parent) in parents.iter().enumerate() {
        by_parent.entry(parent).or_default().push(item(i)?);
    }
    Ok(by_parent)
}
