//! 渲染管线的端到端测试：用一棵合成模板树把注册表、缓冲池、
//! 协商写入器和静态资源服务串起来验证。

use serde_json::json;
use std::fs;
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

use flate2::read::GzDecoder;
use storefront::{
    exception::Exception,
    param::{HttpEncoding, CONTENT_TYPE_CSS, CONTENT_TYPE_PNG},
    resource, BufferPool, Renderer, Request, Response, TemplateRegistry,
};

struct Fixture {
    _dir: TempDir,
    renderer: Renderer,
    pool: Arc<BufferPool>,
    public_root: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();

    // 模板树：common 布局 + 三个页面
    let common = dir.path().join("templates/common");
    fs::create_dir_all(&common).unwrap();
    fs::write(
        common.join("base.tmpl"),
        "<html><head><title>{{title}}</title></head><body>{{> header}}{{> content}}{{> footer}}</body></html>",
    )
    .unwrap();
    fs::write(common.join("header.tmpl"), "<header>{{site.name}}</header>").unwrap();
    fs::write(common.join("footer.tmpl"), "<footer>(c) lemonade</footer>").unwrap();

    for (page, content) in [
        ("home", "<p>Welcome {{user}}</p>"),
        ("products", "<ul><li>{{product.name}}: {{product.price}}</li></ul>"),
        ("standlocator", "<div>{{stand.address}}</div>"),
    ] {
        let page_dir = dir.path().join("templates/pages").join(page);
        fs::create_dir_all(&page_dir).unwrap();
        fs::write(page_dir.join("content.tmpl"), content).unwrap();
    }

    // 静态资源树
    let public = dir.path().join("public");
    fs::create_dir_all(public.join("img")).unwrap();
    fs::create_dir_all(public.join("css")).unwrap();
    let png: Vec<u8> = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
        .iter()
        .copied()
        .chain((0..=255u8).cycle().take(512))
        .collect();
    fs::write(public.join("img/logo.png"), &png).unwrap();
    fs::write(
        public.join("css/site.css"),
        "body { margin: 0 auto; } ".repeat(30),
    )
    .unwrap();

    let templates_root = dir.path().join("templates");
    let registry =
        Arc::new(TemplateRegistry::build(templates_root.to_str().unwrap()).unwrap());
    let pool = BufferPool::with_capacity(8);
    let renderer = Renderer::new(registry, Arc::clone(&pool));

    Fixture {
        public_root: public,
        _dir: dir,
        renderer,
        pool,
    }
}

fn request(raw: &str) -> Request {
    Request::try_from(&raw.as_bytes().to_vec(), 0).unwrap()
}

fn plain_request() -> Request {
    request("GET / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n")
}

fn gzip_request() -> Request {
    request("GET / HTTP/1.1\r\nHost: localhost:7878\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n")
}

/// 模板树中的每个页面构建后都可查询，并对良构数据产生非空输出
#[test]
fn every_registered_page_renders_non_empty_output() {
    let f = fixture();
    let data = json!({
        "title": "t",
        "site": {"name": "Lemonade"},
        "user": "guest",
        "product": {"name": "classic", "price": "12"},
        "stand": {"address": "market st"},
    });

    for page in ["home", "products", "standlocator"] {
        let mut response = Response::new();
        f.renderer
            .render_page(&mut response, &plain_request(), page, &data)
            .unwrap();
        assert!(!response.body().is_empty(), "页面{}的输出为空", page);
        let html = String::from_utf8_lossy(response.body());
        assert!(html.contains("<header>Lemonade</header>"));
        assert!(html.contains("(c) lemonade"));
    }
}

/// 不在模板树中的页面名：TemplateNotFound，响应未被写入
#[test]
fn absent_page_yields_template_not_found_and_writes_nothing() {
    let f = fixture();
    let mut response = Response::new();

    let result = f
        .renderer
        .render_page(&mut response, &plain_request(), "categories", &json!({}));

    assert!(matches!(result, Err(Exception::TemplateNotFound(_))));
    assert!(response.body().is_empty());

    // 翻译后是500，带非空纯文本主体
    let translated = Response::from_exception(&result.unwrap_err());
    assert_eq!(translated.status_code(), 500);
    assert!(!translated.body().is_empty());
}

/// 同一（页面, 数据）两次渲染输出字节一致
#[test]
fn rendering_is_deterministic() {
    let f = fixture();
    let data = json!({"title": "x", "site": {"name": "L"}, "user": "u"});

    let mut first = Response::new();
    let mut second = Response::new();
    f.renderer
        .render_page(&mut first, &gzip_request(), "home", &data)
        .unwrap();
    f.renderer
        .render_page(&mut second, &gzip_request(), "home", &data)
        .unwrap();

    assert_eq!(first.body(), second.body());
}

/// 缓冲池复用不泄漏上一个请求的数据
#[test]
fn pool_reuse_never_leaks_prior_request_data() {
    let f = fixture();

    let mut response_a = Response::new();
    f.renderer
        .render_page(
            &mut response_a,
            &plain_request(),
            "home",
            &json!({"title": "a", "site": {"name": "L"}, "user": "SECRET_A"}),
        )
        .unwrap();
    assert!(String::from_utf8_lossy(response_a.body()).contains("SECRET_A"));

    let mut response_b = Response::new();
    f.renderer
        .render_data(&mut response_b, &plain_request(), &json!({"unrelated": true}))
        .unwrap();

    assert!(!String::from_utf8_lossy(response_b.body()).contains("SECRET_A"));
}

/// 协商写入：声明支持压缩→设置编码头且主体可解压还原；
/// 未声明→主体与写入字节完全一致且无编码头
#[test]
fn negotiation_header_and_round_trip() {
    let f = fixture();
    let data = json!({"title": "neg", "site": {"name": "L"}, "user": "joe"});

    let mut compressed = Response::new();
    f.renderer
        .render_page(&mut compressed, &gzip_request(), "home", &data)
        .unwrap();
    assert_eq!(compressed.content_encoding(), Some(HttpEncoding::Gzip));

    let mut identity = Response::new();
    f.renderer
        .render_page(&mut identity, &plain_request(), "home", &data)
        .unwrap();
    assert!(identity.content_encoding().is_none());

    let mut decoded = Vec::new();
    GzDecoder::new(compressed.body())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, identity.body());
}

/// 静态资源：缺失文件→404非空纯文本；png→原始字节逐字节一致
#[test]
fn static_serving_matches_contract() {
    let f = fixture();

    let missing = f.public_root.join("img/ghost.png");
    let mut response = Response::new();
    let err = resource::serve(
        &mut response,
        &gzip_request(),
        missing.to_str().unwrap(),
        CONTENT_TYPE_PNG,
    )
    .unwrap_err();
    let translated = Response::from_exception(&err);
    assert_eq!(translated.status_code(), 404);
    assert!(!translated.body().is_empty());

    let logo = f.public_root.join("img/logo.png");
    let expected = fs::read(&logo).unwrap();
    let mut response = Response::new();
    resource::serve(
        &mut response,
        &gzip_request(),
        logo.to_str().unwrap(),
        CONTENT_TYPE_PNG,
    )
    .unwrap();
    assert_eq!(response.body(), expected.as_slice());
    assert!(response.content_encoding().is_none());

    let css = f.public_root.join("css/site.css");
    let mut response = Response::new();
    resource::serve(
        &mut response,
        &gzip_request(),
        css.to_str().unwrap(),
        CONTENT_TYPE_CSS,
    )
    .unwrap();
    assert_eq!(response.content_encoding(), Some(HttpEncoding::Gzip));
}

/// 渲染中途失败时借出的缓冲区仍被归还：失败前后池的可用量不变
#[test]
fn failed_render_still_returns_buffer_to_pool() {
    let dir = TempDir::new().unwrap();
    let common = dir.path().join("common");
    fs::create_dir_all(&common).unwrap();
    fs::write(common.join("base.tmpl"), "{{> content}}").unwrap();
    let page = dir.path().join("pages/broken");
    fs::create_dir_all(&page).unwrap();
    fs::write(page.join("content.tmpl"), "ok so far {{> missing_fragment}}").unwrap();

    let registry = Arc::new(TemplateRegistry::build(dir.path().to_str().unwrap()).unwrap());
    let pool = BufferPool::with_capacity(8);
    let renderer = Renderer::new(registry, Arc::clone(&pool));

    // 预热：一次成功借还，池中有一个空闲缓冲区
    {
        let mut response = Response::new();
        let _ = renderer.render_data(&mut response, &plain_request(), &json!({}));
    }
    let idle_before = pool.idle();

    let mut response = Response::new();
    let result = renderer.render_page(&mut response, &plain_request(), "broken", &json!({}));

    assert!(matches!(result, Err(Exception::RenderFailure(_))));
    assert_eq!(pool.idle(), idle_before);
    assert!(response.body().is_empty());
}
