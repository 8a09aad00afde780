//! # 静态资源服务模块
//!
//! 把 `public/` 目录下的文件流式写入响应。非图片类型走与页面渲染相同的
//! 协商写入器纪律；图片类型绕过协商，原始字节直通——对已压缩的图片格式
//! 再做一次压缩没有任何收益。
//!
//! 文件句柄是作用域内获取的，所有退出路径上都会随作用域结束关闭。

use crate::{exception::Exception, negotiate::NegotiatedWriter, request::Request, response::Response};

use log::debug;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Write};

/// 将 `file_path` 指定的文件以 `content_type` 写入响应。
///
/// 文件不存在 → `ResourceNotFound`（上层翻译为 404）；
/// 存在但无法打开或读取 → `ResourceUnreadable`（翻译为 500）。
pub fn serve(
    response: &mut Response,
    request: &Request,
    file_path: &str,
    content_type: &str,
) -> Result<(), Exception> {
    let file = File::open(file_path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Exception::ResourceNotFound(file_path.to_string()),
        _ => Exception::ResourceUnreadable(file_path.to_string()),
    })?;
    let mut reader = BufReader::new(file);

    response.set_content_type(content_type);

    // 图片类型不参与协商，原始字节直通
    if content_type.starts_with("image/") {
        debug!("图片资源{}直通传输", file_path);
        io::copy(&mut reader, response.body_mut())
            .map_err(|e| Exception::ResourceUnreadable(format!("{}: {}", file_path, e)))?;
        return Ok(());
    }

    debug!("资源{}经协商写入器传输", file_path);
    let mut writer = NegotiatedWriter::open(response, request);
    if let Err(e) = io::copy(&mut reader, &mut writer) {
        let _ = writer.close();
        return Err(Exception::ResourceUnreadable(format!("{}: {}", file_path, e)));
    }
    writer
        .close()
        .map_err(|e| Exception::WriteFailure(e.to_string()))
}
