use criterion::{criterion_group, criterion_main, Criterion};
use sift_core::tokenizer::{gramify, tokenize};

const TEXT: &str = "In this example, SetMaxOpenConns specifies the maximum number of open connections in the pool. \
When you perform database operations concurrently from multiple workers, each worker will obtain a connection \
from the pool. If all 25 connections are in use, additional workers wait until a connection becomes available. \
Café, naïve, déjà vu — and 🙂 symbols + math = fun!";

fn bench_tokenize(c: &mut Criterion) {
    let text = TEXT.repeat(50);
    c.bench_function("tokenize_paragraphs", |b| b.iter(|| tokenize(text.as_bytes()).count()));
}

fn bench_gramify(c: &mut Criterion) {
    let terms: Vec<String> = tokenize(TEXT.repeat(50).as_bytes()).collect();
    c.bench_function("gramify_1_3", |b| b.iter(|| gramify(&terms, 1, 3).count()));
}

criterion_group!(benches, bench_tokenize, bench_gramify);
criterion_main!(benches);
