use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use storefront::{BufferPool, Renderer, Request, Response, TemplateRegistry};

fn setup_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let common = dir.path().join("common");
    fs::create_dir_all(&common).unwrap();
    fs::write(
        common.join("base.tmpl"),
        "<html><head><title>{{title}}</title></head><body>{{> header}}{{> content}}</body></html>",
    )
    .unwrap();
    fs::write(common.join("header.tmpl"), "<h1>{{site.name}}</h1>").unwrap();

    let home = dir.path().join("pages/home");
    fs::create_dir_all(&home).unwrap();
    fs::write(
        home.join("content.tmpl"),
        "<p>{{greeting}}</p>".repeat(50),
    )
    .unwrap();

    dir
}

fn setup_renderer(dir: &TempDir) -> Renderer {
    let registry = Arc::new(TemplateRegistry::build(dir.path().to_str().unwrap()).unwrap());
    let pool = BufferPool::with_capacity(32);
    Renderer::new(registry, pool)
}

fn make_request(raw: &str) -> Request {
    Request::try_from(&raw.as_bytes().to_vec(), 0).unwrap()
}

fn render_page_benchmark(c: &mut Criterion) {
    let dir = setup_tree();
    let renderer = setup_renderer(&dir);
    let request = make_request("GET / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n");
    let data = json!({"title": "bench", "site": {"name": "Lemonade"}, "greeting": "hello"});

    c.bench_function("render_page_identity", |b| {
        b.iter(|| {
            let mut response = Response::new();
            renderer
                .render_page(
                    black_box(&mut response),
                    black_box(&request),
                    black_box("home"),
                    black_box(&data),
                )
                .unwrap();
        });
    });
}

fn render_page_compressed_benchmark(c: &mut Criterion) {
    let dir = setup_tree();
    let renderer = setup_renderer(&dir);
    let data = json!({"title": "bench", "site": {"name": "Lemonade"}, "greeting": "hello"});

    let mut group = c.benchmark_group("render_page_compressed");
    for encoding in ["gzip", "deflate", "br"].iter() {
        let raw = format!(
            "GET / HTTP/1.1\r\nHost: localhost:7878\r\nAccept-Encoding: {}\r\n\r\n",
            encoding
        );
        let request = make_request(&raw);
        group.bench_with_input(BenchmarkId::from_parameter(encoding), encoding, |b, _| {
            b.iter(|| {
                let mut response = Response::new();
                renderer
                    .render_page(
                        black_box(&mut response),
                        black_box(&request),
                        black_box("home"),
                        black_box(&data),
                    )
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn render_data_benchmark(c: &mut Criterion) {
    let dir = setup_tree();
    let renderer = setup_renderer(&dir);
    let request = make_request("GET / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n");

    let mut group = c.benchmark_group("render_data");
    for size in [10, 100, 1000].iter() {
        let items: Vec<_> = (0..*size)
            .map(|i| json!({"name": format!("product-{}", i), "price": i}))
            .collect();
        let data = json!({"products": items});
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut response = Response::new();
                renderer
                    .render_data(black_box(&mut response), black_box(&request), black_box(&data))
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn buffer_pool_benchmark(c: &mut Criterion) {
    use std::io::Write;

    let pool = BufferPool::with_capacity(32);
    let payload = vec![b'x'; 4096];

    c.bench_function("bufpool_borrow_write_return", |b| {
        b.iter(|| {
            let mut buf = pool.get();
            buf.write_all(black_box(&payload)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    render_page_benchmark,
    render_page_compressed_benchmark,
    render_data_benchmark,
    buffer_pool_benchmark
);
criterion_main!(benches);
