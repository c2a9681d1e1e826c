//! Binary tree codec benchmarks.
//!
//! Run with: `cargo bench`
//! Save baseline: `cargo bench -- --save-baseline main`
//! Compare: `cargo bench -- --baseline main`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use xqi::codec;
use xqi::tree::{Attribute, Document, DocumentBuilder, QName};

/// A play-shaped document with `acts * speeches` speech elements.
fn synthetic(acts: usize, speeches: usize) -> Document {
    let mut b = DocumentBuilder::new();
    b.start_element(QName::local("play"));
    b.start_element(QName::local("title"));
    b.text("The Benchmark of Errors");
    b.end_element();
    for act in 0..acts {
        b.start_element_full(
            QName::local("act"),
            vec![Attribute::new(QName::local("n"), (act + 1).to_string())],
            vec![],
        );
        for i in 0..speeches {
            b.start_element_full(
                QName::local("speech"),
                vec![Attribute::new(QName::local("speaker"), "DROMIO")],
                vec![],
            );
            b.start_element(QName::local("line"));
            b.text(format!(
                "Line {i} of act {act}: there's a time for all things"
            ));
            b.end_element();
            b.end_element();
        }
        b.end_element();
    }
    b.end_element();
    b.build()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for (acts, speeches) in [(1, 10), (5, 50), (20, 100)] {
        let doc = synthetic(acts, speeches);
        group.bench_with_input(
            BenchmarkId::from_parameter(doc.len()),
            &doc,
            |b, doc| b.iter(|| codec::encode(black_box(doc))),
        );
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for (acts, speeches) in [(1, 10), (5, 50), (20, 100)] {
        let doc = synthetic(acts, speeches);
        let buf = codec::encode(&doc);
        group.bench_with_input(
            BenchmarkId::from_parameter(doc.len()),
            &buf,
            |b, buf| b.iter(|| codec::decode(black_box(buf)).unwrap()),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
