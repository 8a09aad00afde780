// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 渲染器模块
//!
//! 渲染器把模板注册表、缓冲池和内容协商写入器串成一条完整的响应生成管线。
//! 两个入口共享同一套"暂存缓冲 + 协商写出"的纪律：
//!
//! - [`Renderer::render_page`]：页面名 + 数据值 → HTML 响应主体。
//! - [`Renderer::render_data`]：数据值 → JSON 响应主体。
//!
//! 模板先执行到池化缓冲区里，成功后才经协商写入器拷贝进响应。
//! 中途失败时客户端不会看到半截页面——缓冲把部分渲染失败和网络隔离开了。
//! 借出的缓冲区由守卫负责归还，写入器在所有退出路径上都会被关闭。

use crate::{
    bufpool::BufferPool,
    exception::Exception,
    negotiate::NegotiatedWriter,
    param::{CONTENT_TYPE_HTML, CONTENT_TYPE_JSON},
    request::Request,
    response::Response,
    template::TemplateRegistry,
};

use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;

/// 响应渲染管线的编排者。
///
/// 注册表和缓冲池都在启动时构建一次，之后通过 `Arc` 注入到每个连接任务中，
/// 不依赖任何进程级全局状态，测试时可以用合成模板树独立构造。
pub struct Renderer {
    registry: Arc<TemplateRegistry>,
    pool: Arc<BufferPool>,
}

impl Renderer {
    pub fn new(registry: Arc<TemplateRegistry>, pool: Arc<BufferPool>) -> Self {
        Self { registry, pool }
    }

    /// 将页面模板对数据值执行，产出 HTML 响应主体。
    ///
    /// 页面名没有对应的编译模板时返回 `TemplateNotFound`，此时响应未被触碰。
    /// 模板执行失败时同样不会有任何字节到达响应——输出只进入了池化缓冲区，
    /// 而缓冲区由守卫在函数返回前归还。
    pub fn render_page(
        &self,
        response: &mut Response,
        request: &Request,
        page_name: &str,
        data: &Value,
    ) -> Result<(), Exception> {
        let template = self
            .registry
            .get(page_name)
            .ok_or_else(|| Exception::TemplateNotFound(page_name.to_string()))?;

        // 借出缓冲区，守卫保证所有退出路径上都归还
        let mut buffer = self.pool.get();
        template.execute(&mut buffer, data)?;
        debug!("页面{}渲染完成，暂存{}字节", page_name, buffer.len());

        response.set_content_type(CONTENT_TYPE_HTML);
        write_staged(response, request, buffer.as_slice())
    }

    /// 将任意可序列化的数据值编码为 JSON，产出结构化数据响应主体。
    ///
    /// 序列化失败同样发生在任何网络写出之前。
    pub fn render_data<T: Serialize>(
        &self,
        response: &mut Response,
        request: &Request,
        data: &T,
    ) -> Result<(), Exception> {
        let mut buffer = self.pool.get();
        serde_json::to_writer(&mut buffer, data)
            .map_err(|e| Exception::RenderFailure(e.to_string()))?;
        debug!("JSON序列化完成，暂存{}字节", buffer.len());

        response.set_content_type(CONTENT_TYPE_JSON);
        write_staged(response, request, buffer.as_slice())
    }
}

// 把暂存好的主体经协商写入器拷贝进响应，并保证写入器恰好关闭一次
fn write_staged(
    response: &mut Response,
    request: &Request,
    staged: &[u8],
) -> Result<(), Exception> {
    let mut writer = NegotiatedWriter::open(response, request);
    if let Err(e) = writer.write_all(staged) {
        let _ = writer.close();
        return Err(Exception::WriteFailure(e.to_string()));
    }
    writer
        .close()
        .map_err(|e| Exception::WriteFailure(e.to_string()))
}
