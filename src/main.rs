// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 店面站点 Web 服务器
//!
//! 该模块实现了基于 Tokio 运行时的多线程店面站点服务端。
//! 核心功能包括：
//! - 启动期一次性构建的页面模板注册表（公共片段 + 页面片段合并编译）
//! - 容量受限的缓冲池，渲染输出先暂存后发送
//! - 基于 `Accept-Encoding` 的内容协商压缩（gzip / deflate / brotli）
//! - 静态资源服务（图片直通，样式表参与协商）
//! - 后台管理控制台（CLI 指令交互）

// --- 模块定义 ---
mod bufpool;    // 可复用的输出暂存缓冲池
mod config;     // 配置解析与管理
mod exception;  // 自定义异常与错误翻译
mod negotiate;  // 内容协商写入器
mod param;      // 全局常量与静态参数
mod render;     // 页面与JSON渲染管线
mod request;    // HTTP 请求报文解析器
mod resource;   // 静态资源服务
mod response;   // HTTP 响应报文构建器
mod template;   // 页面模板注册表

use bufpool::BufferPool;
use config::Config;
use exception::Exception;
use render::Renderer;
use request::Request;
use response::Response;
use template::TemplateRegistry;

use log::{debug, error, info, warn};
use log4rs;
use serde_json::{json, Value};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::{Arc, Mutex},
    time::Instant,
};

use crate::param::{HttpRequestMethod, CONTENT_TYPE_CSS, CONTENT_TYPE_PNG};

/// # 程序入口点
///
/// 初始化日志与配置，构建模板注册表和缓冲池，然后启动主事件循环。
/// 模板注册表构建失败是致命的：没有完整的模板集就不该开始监听端口。
fn main() {
    // 1. 初始化日志系统：采用 log4rs 异步日志架构，通过外部 YAML 灵活配置级别与输出目的地
    log4rs::init_file("config/log4rs.yaml", Default::default()).unwrap();

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = Config::from_toml("config/development.toml");
    info!("配置文件已载入");
    info!("templates root: {}", config.templates_root());
    info!("public root: {}", config.public_root());

    // 3. 启动期构建模板注册表。任何失败都立即中止启动。
    let registry = match TemplateRegistry::build(config.templates_root()) {
        Ok(registry) => {
            info!("模板注册表构建完成，共{}个页面", registry.len());
            Arc::new(registry)
        }
        Err(e) => {
            error!("模板注册表构建失败：{}", e);
            panic!("模板注册表构建失败：{}", e);
        }
    };

    // 4. 共享资源初始化：缓冲池与渲染器经 Arc 注入到每个连接任务
    let pool = BufferPool::with_capacity(config.pool_capacity());
    let renderer = Arc::new(Renderer::new(Arc::clone(&registry), pool));
    let config_arc = Arc::new(config.clone());

    // 5. 异步运行时定制：根据配置文件动态分配工作线程数
    let worker_threads = config.worker_threads();
    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(serve(config_arc, renderer));
}

/// 主事件循环：绑定端口，持续接收新连接并分发到 Tokio 线程池处理。
async fn serve(config: Arc<Config>, renderer: Arc<Renderer>) {
    // 网络层初始化：支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
    let port: u16 = config.port();
    info!("服务端将在{}端口上监听Socket连接", port);
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}地址上监听Socket连接", address);
    let socket = SocketAddrV4::new(address, port);

    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            panic!("无法绑定端口：{}，错误：{}", port, e);
        }
    };
    info!("端口{}绑定完成", port);

    // 服务器状态与生命周期管理
    // shutdown_flag: 用于优雅停机 (Graceful Shutdown)
    // active_connection: 追踪当前并发连接数
    let shutdown_flag = Arc::new(Mutex::new(false));
    let active_connection = Arc::new(Mutex::new(0u32));

    // 启动交互式管理控制台任务，运行在后台，不阻塞监听循环
    tokio::spawn({
        let shutdown_flag = Arc::clone(&shutdown_flag);
        let active_connection = Arc::clone(&active_connection);
        async move {
            let stdin = tokio::io::stdin();
            let mut reader = BufReader::new(stdin);
            let mut input = String::new();
            loop {
                input.clear();
                if let Ok(_) = reader.read_line(&mut input).await {
                    let cmd = input.trim();
                    match cmd {
                        "stop" => {
                            let mut flag = shutdown_flag.lock().unwrap();
                            *flag = true;
                            println!("停机指令已激活，服务器将在处理完下一个请求后关闭...");
                            break;
                        }
                        "help" => {
                            println!("== Storefront Help ==");
                            println!("stop   - 发出停机信号");
                            println!("status - 查看当前服务器运行状态");
                            println!("help   - 显示此帮助信息");
                            println!("=====================");
                        }
                        "status" => {
                            let active_count = *active_connection.lock().unwrap();
                            println!("== Storefront 状态 ==");
                            println!("当前活跃连接数: {}", active_count);
                            println!("=====================");
                        }
                        _ => {
                            println!("无效的命令：{}", cmd);
                        }
                    }
                } else {
                    break;
                }
            }
        }
    });

    let mut id: u128 = 0;

    loop {
        // 检查停机标志位
        if *shutdown_flag.lock().unwrap() {
            info!("主循环接收到停机指令，正在退出...");
            break;
        }

        // 等待新的 TCP 连接
        let (mut stream, addr) = listener.accept().await.unwrap();
        debug!("新的连接：{}", addr);

        let active_connection_arc = Arc::clone(&active_connection);
        let renderer_arc = Arc::clone(&renderer);
        let config_arc = Arc::clone(&config);

        debug!("[ID{}]TCP连接已建立", id);

        // 使用轻量级绿色线程处理具体请求，确保非阻塞 IO
        tokio::spawn(async move {
            {
                let mut lock = active_connection_arc.lock().unwrap();
                *lock += 1;
            }

            handle_connection(&mut stream, id, renderer_arc, config_arc).await;

            {
                let mut lock = active_connection_arc.lock().unwrap();
                *lock -= 1;
            }
        });
        id += 1; // 增加请求唯一标识序列
    }
}

/// 路由目标：要么是一个逻辑页面，要么是一个静态资源。
enum Route {
    Page(&'static str),
    Asset {
        path: String,
        content_type: &'static str,
    },
}

/// # 路由引擎
///
/// 将抽象的 URI 映射到逻辑页面名或 `public/` 下的物理文件。
///
/// ## 路由规则：
/// 1. 固定的页面路由 -> 模板注册表中的页面名。
/// 2. `/img/<path>` -> 图片静态资源（image/png，原样传输）。
/// 3. `/css/<path>` -> 样式表静态资源（text/css，参与压缩协商）。
fn route(path: &str, public_root: &str) -> Result<Route, Exception> {
    // 去掉查询字符串，路由只看路径部分
    let path = path.split('?').next().unwrap_or(path);

    match path {
        "/" => return Ok(Route::Page("home")),
        "/categories" => return Ok(Route::Page("categories")),
        "/products" => return Ok(Route::Page("products")),
        "/product" => return Ok(Route::Page("product")),
        "/profile" => return Ok(Route::Page("profile")),
        "/stands" => return Ok(Route::Page("standlocator")),
        _ => {}
    }

    // 路径穿越防护：静态资源路径中不允许出现 ".."
    if path.contains("..") {
        return Err(Exception::InvalidPath);
    }

    if path.starts_with("/img/") {
        return Ok(Route::Asset {
            path: [public_root, path].concat(),
            content_type: CONTENT_TYPE_PNG,
        });
    }
    if path.starts_with("/css/") {
        return Ok(Route::Asset {
            path: [public_root, path].concat(),
            content_type: CONTENT_TYPE_CSS,
        });
    }

    Err(Exception::ResourceNotFound(path.to_string()))
}

/// 页面数据的临时出处。真正的控制器会按页面构造各自的视图模型，
/// 这里先用固定的数据值把渲染管线跑通。
fn page_data(page_name: &str) -> Value {
    let site = json!({"name": "Lemonade Stand"});
    match page_name {
        "home" => json!({
            "title": "首页",
            "site": site,
            "greeting": "新鲜柠檬水，现榨现卖",
        }),
        "categories" => json!({
            "title": "商品分类",
            "site": site,
            "categories": ["经典", "气泡", "无糖"],
        }),
        "products" => json!({
            "title": "全部商品",
            "site": site,
            "products": [
                {"name": "经典柠檬水", "price": "12元"},
                {"name": "气泡柠檬水", "price": "15元"},
            ],
        }),
        "product" => json!({
            "title": "商品详情",
            "site": site,
            "product": {"name": "经典柠檬水", "price": "12元", "description": "现榨柠檬，每日限量"},
        }),
        "profile" => json!({
            "title": "个人中心",
            "site": site,
            "user": {"name": "访客"},
        }),
        "standlocator" => json!({
            "title": "门店查询",
            "site": site,
            "stands": [
                {"name": "市场街1号摊位", "address": "市场街1号"},
                {"name": "湖畔摊位", "address": "湖畔公园东门"},
            ],
        }),
        _ => json!({"title": page_name, "site": site}),
    }
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期：读取解析请求、执行路由、驱动渲染管线、
/// 以及把错误翻译成响应后发送。
async fn handle_connection(
    stream: &mut TcpStream,
    id: u128,
    renderer: Arc<Renderer>,
    config: Arc<Config>,
) {
    let mut buffer = vec![0; 1024];

    // 等待流进入可读状态
    stream.readable().await.unwrap();

    // 尝试非阻塞读取 HTTP 报文
    match stream.try_read(&mut buffer) {
        Ok(0) => return, // 客户端主动关闭连接
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
        _ => {}
    }
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();

    // 1. 协议解析阶段：将字节流转换为结构化的 Request 对象
    let request = match Request::try_from(&buffer, id) {
        Ok(req) => req,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {}", id, e);
            let response = Response::from_exception(&e);
            let _ = stream.write_all(&response.as_bytes()).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let response = build_response(&request, id, &renderer, &config);

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );

    // 结构化日志记录：便于后期审计与性能监控
    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, ",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    // 数据发送阶段
    let response_bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, response_bytes.len());
    let _ = stream.write_all(&response_bytes).await;
    let _ = stream.flush().await;
}

/// 执行路由并驱动渲染管线，把所有失败在请求边界统一翻译成错误响应。
fn build_response(
    request: &Request,
    id: u128,
    renderer: &Renderer,
    config: &Config,
) -> Response {
    if request.method() != HttpRequestMethod::Get {
        warn!("[ID{}]不支持的请求方法：{}，返回405", id, request.method());
        return Response::plain_text(405, "This server only supports GET requests");
    }

    let result = match route(request.path(), config.public_root()) {
        Ok(Route::Page(page_name)) => {
            let data = page_data(page_name);
            let mut response = Response::new();
            // Accept 声明 application/json 的客户端直接拿页面数据
            let is_json = request
                .accept()
                .map_or(false, |a| a.contains("application/json"));
            let rendered = if is_json {
                debug!("[ID{}]页面{}以JSON形式返回", id, page_name);
                renderer.render_data(&mut response, request, &data)
            } else {
                debug!("[ID{}]渲染页面{}", id, page_name);
                renderer.render_page(&mut response, request, page_name, &data)
            };
            rendered.map(|_| response)
        }
        Ok(Route::Asset { path, content_type }) => {
            debug!("[ID{}]静态资源：{}（{}）", id, path, content_type);
            let mut response = Response::new();
            resource::serve(&mut response, request, &path, content_type).map(|_| response)
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            warn!(
                "[ID{}]请求{}处理失败：{}，返回{}",
                id,
                request.path(),
                e,
                e.status_code()
            );
            Response::from_exception(&e)
        }
    }
}
