//! Benchmarks for the conversion paths.
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use palimpsest::markdown::{html_to_markdown, markdown_to_html};
use palimpsest::{ContentEnvelope, Converter, HtmlOptions, sanitize, truncate_html};

const ESSAY: &str = include_str!("../tests/fixtures/essay.md");

fn essay_html() -> String {
    markdown_to_html(ESSAY)
}

// ============================================================================
// Markdown
// ============================================================================

fn bench_markdown_to_html(c: &mut Criterion) {
    c.bench_function("markdown_to_html", |b| {
        b.iter(|| markdown_to_html(black_box(ESSAY)));
    });
}

fn bench_html_to_markdown(c: &mut Criterion) {
    let html = essay_html();

    c.bench_function("html_to_markdown", |b| {
        b.iter(|| html_to_markdown(black_box(&html)));
    });
}

// ============================================================================
// HTML
// ============================================================================

fn bench_sanitize(c: &mut Criterion) {
    let html = essay_html();

    c.bench_function("sanitize", |b| {
        b.iter(|| sanitize(black_box(&html)));
    });
}

fn bench_truncate_html(c: &mut Criterion) {
    let html = essay_html();

    c.bench_function("truncate_html", |b| {
        b.iter(|| truncate_html(black_box(&html), 50, "..."));
    });
}

// ============================================================================
// Dispatcher
// ============================================================================

fn bench_word_count(c: &mut Criterion) {
    let converter = Converter::default();
    let envelope = ContentEnvelope::Markdown(ESSAY.to_string());

    c.bench_function("word_count", |b| {
        b.iter(|| converter.word_count(black_box(&envelope)));
    });
}

fn bench_to_html_with_math(c: &mut Criterion) {
    let converter = Converter::default();
    let envelope = ContentEnvelope::Markdown(ESSAY.to_string());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    c.bench_function("to_html_with_math", |b| {
        b.iter(|| runtime.block_on(converter.to_html(black_box(&envelope), HtmlOptions::default())));
    });
}

criterion_group!(
    benches,
    // Markdown
    bench_markdown_to_html,
    bench_html_to_markdown,
    // HTML
    bench_sanitize,
    bench_truncate_html,
    // Dispatcher
    bench_word_count,
    bench_to_html_with_math,
);
criterion_main!(benches);
