use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hydrogen::routing::Matcher;

fn benchmark_compile(c: &mut Criterion) {
    c.bench_function("compile_static_pattern", |b| {
        b.iter(|| {
            let matcher = Matcher::compile(black_box("/api/v1/users"));
            black_box(matcher)
        })
    });

    c.bench_function("compile_dynamic_pattern", |b| {
        b.iter(|| {
            let matcher = Matcher::compile(black_box("/api/v1/resources/{type}/{id}"));
            black_box(matcher)
        })
    });
}

fn benchmark_static_match(c: &mut Criterion) {
    let matcher = Matcher::compile("/api/users").unwrap();

    c.bench_function("static_route_match", |b| {
        b.iter(|| black_box(matcher.matches(black_box("/api/users"))))
    });

    c.bench_function("static_route_miss", |b| {
        b.iter(|| black_box(matcher.matches(black_box("/nonexistent"))))
    });
}

fn benchmark_dynamic_match(c: &mut Criterion) {
    let matcher = Matcher::compile("/users/{id}/posts/{post_id}").unwrap();

    c.bench_function("dynamic_route_match", |b| {
        b.iter(|| black_box(matcher.matches(black_box("/users/123/posts/456"))))
    });

    c.bench_function("dynamic_route_miss_depth", |b| {
        b.iter(|| black_box(matcher.matches(black_box("/users/123/posts"))))
    });
}

fn benchmark_linear_scan(c: &mut Criterion) {
    // Dispatch is a linear walk; this is the worst case for a single request
    let matchers: Vec<Matcher> = (0..100)
        .map(|i| Matcher::compile(&format!("/section{}/{{id}}", i)).unwrap())
        .collect();

    c.bench_function("scan_100_patterns_last_hit", |b| {
        b.iter(|| {
            let hit = matchers
                .iter()
                .find_map(|m| m.matches(black_box("/section99/42")));
            black_box(hit)
        })
    });
}

criterion_group!(
    benches,
    benchmark_compile,
    benchmark_static_match,
    benchmark_dynamic_match,
    benchmark_linear_scan
);
criterion_main!(benches);
