use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use weft::{Config, Engine};

const NUM_THREADS: usize = 8;

pub fn render_bench(c: &mut Criterion) {
    let weights = Default::default();
    let mut rng = rand::prelude::StdRng::seed_from_u64(17);
    let input = performance::generate_random_template(&mut rng, 64 * 1000, &weights);

    let mut group = c.benchmark_group("render");

    for shared in [false, true] {
        let engine = Engine::builder()
            .config(Config::default().with_shared_accessor_cache(shared))
            .build();
        let template = engine.compile("random.wft", &input).unwrap();
        let suffix = if shared { "shared_cache" } else { "context_cache" };

        group.bench_function(format!("single_thread_{suffix}"), |b| {
            b.iter(|| {
                let mut ctx = performance::sample_context();
                engine.render_to_string(&template, &mut ctx).unwrap()
            })
        });

        group.bench_function(format!("{NUM_THREADS}_threads_{suffix}"), |b| {
            b.iter(|| {
                std::thread::scope(|scope| {
                    for _ in 0..NUM_THREADS {
                        scope.spawn(|| {
                            let mut ctx = performance::sample_context();
                            engine.render_to_string(&template, &mut ctx).unwrap()
                        });
                    }
                })
            })
        });
    }
}

criterion_group!(benches, render_bench);
criterion_main!(benches);
