// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内容协商写入模块
//!
//! 每个产生响应主体的路径（页面渲染、JSON 渲染、非图片静态资源）都通过
//! [`NegotiatedWriter`] 向响应写入字节。写入器在构造时根据请求的
//! `Accept-Encoding` 决定是否套一层压缩编码器，并在写出任何字节之前
//! 把选中的编码写进响应头。把这个决定收敛到一个构造函数里，
//! 各条响应路径就共享了完全一致的协商与收尾逻辑。
//!
//! 生命周期约定：写入器在首次写入前创建，写入零次或多次，最后恰好
//! 关闭一次。[`NegotiatedWriter::close`] 会冲刷并终结压缩上下文，
//! 必须在所有退出路径上执行，包括出错提前返回的路径。
//!
//! 图片内容不参与协商：对已经压缩过的二进制图片格式再压一遍只浪费 CPU，
//! 静态资源服务对图片类型直接绕过本模块写原始字节。

use crate::{param::HttpEncoding, request::Request, response::Response};

use brotli::CompressorWriter;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::debug;
use std::io::{self, Write};

/// 写入响应主体的封闭变体集：原样直写，或经过某种压缩编码器。
pub enum NegotiatedWriter<'a> {
    Raw(&'a mut Vec<u8>),
    Gzip(GzEncoder<&'a mut Vec<u8>>),
    Deflate(DeflateEncoder<&'a mut Vec<u8>>),
    Br(Box<CompressorWriter<&'a mut Vec<u8>>>),
}

impl<'a> NegotiatedWriter<'a> {
    /// 针对一个（响应, 请求）对打开写入器。
    ///
    /// 协商结果会立即写入响应的 `Content-encoding` 头，之后的所有写入
    /// 要么原样转发，要么经过对应的压缩变换。
    pub fn open(response: &'a mut Response, request: &Request) -> Self {
        let encoding = decide_encoding(request.accept_encoding());
        debug!("内容协商结果：{:?}", encoding);
        response.set_content_encoding(encoding);

        let body = response.body_mut();
        match encoding {
            None => NegotiatedWriter::Raw(body),
            Some(HttpEncoding::Gzip) => {
                NegotiatedWriter::Gzip(GzEncoder::new(body, Compression::default()))
            }
            Some(HttpEncoding::Deflate) => {
                NegotiatedWriter::Deflate(DeflateEncoder::new(body, Compression::default()))
            }
            Some(HttpEncoding::Br) => {
                NegotiatedWriter::Br(Box::new(CompressorWriter::new(body, 4096, 4, 22)))
            }
        }
    }

    /// 冲刷并终结压缩上下文。每个写入器恰好关闭一次，之后响应主体才算完整。
    pub fn close(self) -> io::Result<()> {
        match self {
            NegotiatedWriter::Raw(_) => Ok(()),
            NegotiatedWriter::Gzip(encoder) => encoder.finish().map(|_| ()),
            NegotiatedWriter::Deflate(encoder) => encoder.finish().map(|_| ()),
            NegotiatedWriter::Br(mut writer) => {
                // CompressorWriter 在析构时写出终止块，这里只需冲刷挂起的数据
                writer.flush()?;
                Ok(())
            }
        }
    }
}

impl Write for NegotiatedWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            NegotiatedWriter::Raw(body) => body.write(data),
            NegotiatedWriter::Gzip(encoder) => encoder.write(data),
            NegotiatedWriter::Deflate(encoder) => encoder.write(data),
            NegotiatedWriter::Br(writer) => writer.write(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            NegotiatedWriter::Raw(body) => body.flush(),
            NegotiatedWriter::Gzip(encoder) => encoder.flush(),
            NegotiatedWriter::Deflate(encoder) => encoder.flush(),
            NegotiatedWriter::Br(writer) => writer.flush(),
        }
    }
}

/// 协商判定：按 gzip > deflate > br 的服务端偏好选取客户端声明支持的编码。
/// 客户端未声明任何支持时选择不压缩。
fn decide_encoding(accept_encoding: &Vec<HttpEncoding>) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else if accept_encoding.contains(&HttpEncoding::Br) {
        Some(HttpEncoding::Br)
    } else {
        None
    }
}
