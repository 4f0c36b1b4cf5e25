// SPDX-License-Identifier: MIT
//! Encode/decode throughput per section compression

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mdocx::{
    decode_from_slice, encode_to_vec, Compression, DecodeOptions, Document, EncodeOptions,
    MarkdownFile, MediaItem,
};
use std::hint::black_box;

fn create_test_document() -> Document {
    // 100 markdown files of ~8KB text
    let files = (0..100)
        .map(|i| {
            let body = format!("## Section {i}\n\nSome prose with a [link](other.md).\n").repeat(200);
            MarkdownFile::new(format!("docs/chapter-{i:03}.md"), body)
        })
        .collect();

    // 1MB of poorly compressible media plus 512KB of zeroes
    let noise: Vec<u8> = (0..1024 * 1024u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();
    let media = vec![
        MediaItem::new("photo", "image/jpeg", noise).with_path("assets/photo.jpg"),
        MediaItem::new("blank", "application/octet-stream", vec![0; 512 * 1024]),
    ];

    let mut doc = Document::new(files).with_media(media);
    doc.populate_sha256();
    doc
}

fn plain_size(doc: &Document) -> u64 {
    let markdown: usize = doc.markdown.files.iter().map(|f| f.content.len()).sum();
    let media: usize = doc.media.items.iter().map(|i| i.data.len()).sum();
    (markdown + media) as u64
}

fn benchmark_encode(c: &mut Criterion) {
    let doc = create_test_document();

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(plain_size(&doc)));
    for &compression in Compression::all() {
        let options = EncodeOptions::new().with_compression(compression);
        group.bench_with_input(
            BenchmarkId::from_parameter(compression),
            &options,
            |b, options| b.iter(|| encode_to_vec(black_box(&doc), options).unwrap()),
        );
    }
    group.finish();
}

fn benchmark_decode(c: &mut Criterion) {
    let doc = create_test_document();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(plain_size(&doc)));
    for &compression in Compression::all() {
        let bytes = encode_to_vec(&doc, &EncodeOptions::new().with_compression(compression)).unwrap();
        println!("{compression}: {} bytes", bytes.len());

        group.bench_with_input(BenchmarkId::from_parameter(compression), &bytes, |b, bytes| {
            b.iter(|| decode_from_slice(black_box(bytes), &DecodeOptions::default()).unwrap())
        });
    }
    group.finish();
}

fn benchmark_decode_without_hashes(c: &mut Criterion) {
    let doc = create_test_document();
    let bytes = encode_to_vec(&doc, &EncodeOptions::default()).unwrap();
    let options = DecodeOptions::new().with_verify_hashes(false);

    c.bench_function("decode_zstd_no_verify", |b| {
        b.iter(|| decode_from_slice(black_box(&bytes), &options).unwrap())
    });
}

criterion_group!(
    benches,
    benchmark_encode,
    benchmark_decode,
    benchmark_decode_without_hashes
);
criterion_main!(benches);
