use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dartrs_core::generation::sampling::{ban_tokens, LogitsProcessor};
use dartrs_core::prelude::*;
use std::sync::Arc;

fn synthetic_logits(vocab_size: usize) -> Vec<f32> {
    (0..vocab_size)
        .map(|i| ((i * 7919) % 1000) as f32 / 100.0)
        .collect()
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample");
    for vocab_size in [1_000, 16_000, 100_000] {
        let mut logits = synthetic_logits(vocab_size);
        ban_tokens(&mut logits, &[1, 2, 3]);

        group.bench_with_input(BenchmarkId::new("top_k_100_top_p_0.9", vocab_size), &logits, |b, logits| {
            let mut sampler = LogitsProcessor::new(Some(42), 1.0, 100, 0.9);
            b.iter(|| sampler.sample(black_box(logits)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("unfiltered", vocab_size), &logits, |b, logits| {
            let mut sampler = LogitsProcessor::new(Some(42), 1.0, 0, 1.0);
            b.iter(|| sampler.sample(black_box(logits)).unwrap())
        });
    }
    group.finish();
}

fn bench_prompt_pipeline(c: &mut Criterion) {
    let tags: Vec<String> = (0..5_000).map(|i| format!("tag {i}")).collect();
    let tokenizer = Arc::new(TagTokenizer::from_tags(tags.iter().cloned()).unwrap());
    let prompt = StructuredPrompt::new("tag 1, tag 2, tag 3, tag 4")
        .copyright("tag 10")
        .character("tag 20");

    c.bench_function("compose_and_encode", |b| {
        b.iter(|| {
            let compiled = compose(black_box(&prompt));
            tokenizer.encode(compiled.as_str()).unwrap()
        })
    });

    let model = BigramModel::uniform(tokenizer.vocab_size()).unwrap();
    let generator = TextGenerator::new(Arc::new(model), tokenizer.clone());
    let config = GenerationConfig::builder(prompt.compose().into_string())
        .max_new_tokens(64)
        .seed(7)
        .build()
        .unwrap();

    c.bench_function("generate_64_tokens", |b| {
        b.iter(|| generator.generate_with_details(black_box(&config)).unwrap())
    });
}

criterion_group!(benches, bench_sampling, bench_prompt_pipeline);
criterion_main!(benches);
