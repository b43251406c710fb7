use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rand::SeedableRng;

pub fn lexer_throughput_bench(c: &mut Criterion) {
    let kb = match std::env::var("LEXER_THROUGHPUT_KB") {
        Ok(val) => match val.parse::<usize>() {
            Ok(val) => val,
            Err(_) => panic!["Failed to parse env var LEXER_THROUGHPUT_KB={} as an integer", val],
        },
        Err(_) => 512,
    };
    let weights = Default::default();
    let mut rng = rand::prelude::StdRng::seed_from_u64(43);
    let input = performance::generate_random_template(&mut rng, kb * 1000, &weights);

    let mut group = c.benchmark_group("lexer-throughput");
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("tokenize", |b| {
        b.iter(|| weft::token::lexer::Lexer::tokenize(&input).unwrap())
    });

    group.bench_function("parse", |b| b.iter(|| weft::parse::parse(&input).unwrap()));
}

criterion_group!(benches, lexer_throughput_bench);
criterion_main!(benches);
