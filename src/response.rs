//! # HTTP 响应报文构建模块
//!
//! `Response` 是渲染管线的输出汇点（response sink）：渲染器和静态资源服务
//! 把经过协商（可能压缩）的主体字节写入其中，最终由连接处理器调用
//! [`Response::as_bytes`] 序列化为完整的 HTTP/1.1 报文发往 Socket。
//!
//! 错误翻译也在这里完成：[`Response::from_exception`] 把管线内部的异常
//! 转化为带纯文本主体的错误响应。

use crate::{exception::Exception, param::*};

use chrono::prelude::*;
use log::error;

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_encoding: Option<HttpEncoding>,
    date: DateTime<Utc>,
    server_name: String,
    body: Vec<u8>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_encoding: None,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            body: Vec::new(),
        }
    }

    /// 构建一个带纯文本主体的响应，主要用于错误报告
    pub fn plain_text(code: u16, message: &str) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.set_content_type(CONTENT_TYPE_PLAIN);
        response.body.extend_from_slice(message.as_bytes());
        response
    }

    /// 错误翻译：把管线异常映射为对应状态码的纯文本响应。
    ///
    /// 异常都是请求级的非瞬态失败，不做重试，错误信息原样作为响应主体。
    pub fn from_exception(exception: &Exception) -> Self {
        Self::plain_text(exception.status_code(), &exception.to_string())
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&information) => information.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                panic!();
            }
        };
        self
    }

    pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    // 由协商写入器在写出首字节之前设置
    pub(crate) fn set_content_encoding(&mut self, encoding: Option<HttpEncoding>) {
        self.content_encoding = encoding;
    }

    /// 响应主体的写入端。协商写入器和图片直通路径都写到这里。
    pub(crate) fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    /// 将响应序列化为可直接写入 Socket 的字节序列
    pub fn as_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let content_length: &str = &self.body.len().to_string();
        let date: &str = &format_date(&self.date);
        let server: &str = &self.server_name;

        let header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match self.content_encoding {
                Some(e) => ["Content-encoding: ", &e.to_string(), CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            "Date: ",
            date,
            CRLF,
            "Server: ",
            server,
            CRLF,
            CRLF,
        ]
        .concat();
        [header.as_bytes(), self.body.as_slice()].concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}
