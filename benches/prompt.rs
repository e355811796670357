//! Prompt formatting and stop-sequence scanning on the per-token path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gguf_chat::model::{format_prompt, CompletionTracker, StopMatcher, DEFAULT_STOP_SEQUENCES};

fn stop_sequences() -> Vec<String> {
    DEFAULT_STOP_SEQUENCES.iter().map(|s| s.to_string()).collect()
}

fn bench_format_prompt(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_prompt");

    for size in [16usize, 512, 8192].iter() {
        let message = "a".repeat(*size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &message, |b, message| {
            b.iter(|| format_prompt(black_box(message)))
        });
    }

    group.finish();
}

fn bench_stop_scan(c: &mut Criterion) {
    let matcher = StopMatcher::new(&stop_sequences());
    let text = "word ".repeat(256);

    c.bench_function("stop_matcher_find_miss", |b| {
        b.iter(|| matcher.find(black_box(&text)))
    });
}

/// Cumulative decode fed token by token, as the sampling loop does
fn bench_tracker(c: &mut Criterion) {
    let sequences = stop_sequences();
    let mut group = c.benchmark_group("completion_tracker");

    for tokens in [32usize, 256].iter() {
        group.throughput(Throughput::Elements(*tokens as u64));
        group.bench_with_input(BenchmarkId::from_parameter(tokens), tokens, |b, &tokens| {
            b.iter(|| {
                let mut tracker = CompletionTracker::new(StopMatcher::new(&sequences), tokens);
                let mut decoded = String::new();
                while !tracker.is_done() {
                    decoded.push_str("tok ");
                    tracker.observe(decoded.clone());
                }
                black_box(tracker.completion_tokens())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_format_prompt, bench_stop_scan, bench_tracker);
criterion_main!(benches);
