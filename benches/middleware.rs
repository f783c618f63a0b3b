use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hydrogen::error::Result;
use hydrogen::http::{Request, Response};
use hydrogen::middleware::builtin::{CorsMiddleware, CorsPolicy};
use hydrogen::middleware::{execute, EndFn, Handler, Middleware, Next, PathHandler};
use hyper::Method;
use std::sync::Arc;

// Pass-through middleware that adds a header to simulate work
struct BenchMiddleware;

#[async_trait]
impl Handler for BenchMiddleware {
    async fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
        res.append_header("X-Bench", "1")?;
        next.run(req, res).await
    }

    fn name(&self) -> &'static str {
        "bench"
    }
}

fn route(pattern: &str) -> Middleware {
    PathHandler::new(
        Method::GET,
        pattern,
        EndFn::new(|_req, res| {
            Box::pin(async move {
                res.text("ok");
                Ok(())
            })
        }),
    )
    .unwrap()
    .into()
}

fn chain(layers: usize, routes: usize) -> Vec<Middleware> {
    let mut chain: Vec<Middleware> = (0..layers).map(|_| Middleware::handler(BenchMiddleware)).collect();
    for i in 0..routes {
        chain.push(route(&format!("/items{}/{{id}}", i)));
    }
    chain
}

fn benchmark_execute(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let policy = Arc::new(CorsPolicy::default());

    let mut group = c.benchmark_group("execute");

    for (name, layers, routes, target) in [
        ("1_route_hit", 0, 1, "/items0/7"),
        ("5_middleware_hit", 5, 1, "/items0/7"),
        ("10_middleware_50_routes_last", 10, 50, "/items49/7"),
        ("10_middleware_50_routes_miss", 10, 50, "/missing"),
    ] {
        let chain = chain(layers, routes);
        group.bench_function(name, |b| {
            b.iter(|| {
                rt.block_on(async {
                    let mut req = Request::new(Method::GET, black_box(target));
                    let mut res = Response::new();
                    let _ = execute(&chain, &policy, &mut req, &mut res).await;
                    black_box(res.status())
                })
            })
        });
    }

    group.finish();
}

fn benchmark_cors_preflight(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let policy = Arc::new(
        CorsPolicy::new()
            .allow_origins(vec!["https://a.example".into(), "https://b.example".into()])
            .allow_credentials(true)
            .max_age(600)
            .preflight_continue(false),
    );
    let chain = vec![Middleware::handler(CorsMiddleware::new())];

    c.bench_function("cors_preflight", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut req = Request::new(Method::OPTIONS, "/items")
                    .with_header("Origin", "https://b.example")
                    .with_header("Access-Control-Request-Headers", "content-type");
                let mut res = Response::new();
                let _ = execute(&chain, &policy, &mut req, &mut res).await;
                black_box(res.status())
            })
        })
    });
}

criterion_group!(benches, benchmark_execute, benchmark_cors_preflight);
criterion_main!(benches);
