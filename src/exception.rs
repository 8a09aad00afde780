// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了渲染管线在请求处理生命周期中可能抛出的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了协议解析错误、模板渲染错误以及静态资源的文件系统错误。
//! - **语义映射**：每个变体都对应特定的业务语义，并通过 [`Exception::status_code`]
//!   统一转化为对应的 HTTP 响应状态码。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到
//!   日志或作为纯文本响应体返回给客户端。
//!
//! 所有异常都在请求边界处理，不做任何重试——它们都不是瞬态故障。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Clone)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了服务器暂不支持的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本（例如：HTTP/0.9 或过高的版本）。
    UnsupportedHttpVersion,
    /// 请求的路径格式非法或包含越权尝试（如目录遍历攻击）。对应 `400 Bad Request`。
    InvalidPath,
    /// 请求的页面名在模板注册表中不存在。
    ///
    /// 走到这里说明路由与注册表不一致，属于编程错误而非用户输入问题，
    /// 因此在 Web 语义中对应 `500 Internal Server Error` 而不是 404。
    TemplateNotFound(String),
    /// 模板执行或数据序列化失败。对应 `500 Internal Server Error`。
    RenderFailure(String),
    /// 在资源根目录下未找到所请求的静态文件。对应 `404 Not Found`。
    ResourceNotFound(String),
    /// 静态文件存在但无法打开或读取（权限、I/O 故障等）。对应 `500`。
    ResourceUnreadable(String),
    /// 向客户端写出响应时失败，通常是客户端提前断开连接。
    /// 该异常不会单独转化为响应，请求直接终止，但资源释放仍然照常执行。
    WriteFailure(String),
    /// 启动阶段的致命错误：模板目录不可读、片段无法解析、或共享入口片段缺失。
    /// 出现该异常时进程不应继续对外提供服务。
    StartupFatal(String),
}

use Exception::*;

impl Exception {
    /// 将异常映射为对应的 HTTP 状态码。
    ///
    /// 这是错误翻译层的核心：所有请求期的失败最终都经由该映射
    /// 变成一个纯文本响应（见 [`crate::response::Response::from_exception`]）。
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | UnSupportedRequestMethod | UnsupportedHttpVersion
            | InvalidPath => 400,
            ResourceNotFound(_) => 404,
            TemplateNotFound(_) | RenderFailure(_) | ResourceUnreadable(_)
            | WriteFailure(_) | StartupFatal(_) => 500,
        }
    }
}

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
///
/// 这些描述信息会进入系统日志，也会作为错误响应的纯文本主体发送给客户端。
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            InvalidPath => write!(f, "Invalid path (400)"),
            TemplateNotFound(name) => write!(f, "The template {} does not exist", name),
            RenderFailure(reason) => write!(f, "Template rendering failed: {}", reason),
            ResourceNotFound(path) => write!(f, "Resource {} not found (404)", path),
            ResourceUnreadable(path) => write!(f, "Resource {} can't be read", path),
            WriteFailure(reason) => write!(f, "Failed to write response: {}", reason),
            StartupFatal(reason) => write!(f, "Fatal startup error: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 校验异常到状态码的映射与各自的 Web 语义一致
    #[test]
    fn test_status_code_mapping() {
        assert_eq!(Exception::InvalidPath.status_code(), 400);
        assert_eq!(
            Exception::ResourceNotFound("img/logo.png".to_string()).status_code(),
            404
        );
        assert_eq!(
            Exception::TemplateNotFound("home".to_string()).status_code(),
            500
        );
        assert_eq!(
            Exception::RenderFailure("boom".to_string()).status_code(),
            500
        );
        assert_eq!(
            Exception::ResourceUnreadable("css/site.css".to_string()).status_code(),
            500
        );
    }

    /// 错误信息必须是非空的，客户端会原样收到这段文本
    #[test]
    fn test_display_is_not_empty() {
        let cases = [
            Exception::RequestIsNotUtf8,
            Exception::TemplateNotFound("profile".to_string()),
            Exception::RenderFailure("missing fragment".to_string()),
            Exception::ResourceNotFound("img/x.png".to_string()),
            Exception::WriteFailure("broken pipe".to_string()),
        ];
        for e in cases {
            assert!(!e.to_string().is_empty());
        }
    }

    /// `TemplateNotFound` 的信息要能说出是哪个页面出了问题
    #[test]
    fn test_template_not_found_names_the_page() {
        let e = Exception::TemplateNotFound("standlocator".to_string());
        assert!(e.to_string().contains("standlocator"));
    }
}
