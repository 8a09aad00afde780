// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板注册表模块
//!
//! 站点的每个逻辑页面（home、categories、products 等）对应一个编译好的多片段模板。
//! 注册表在进程启动时一次性构建：
//!
//! 1. 读取 `<root>/common/*.tmpl`，得到所有页面共享的公共片段（布局、页眉、页脚等）。
//! 2. 枚举 `<root>/pages/` 下的子目录，目录名即页面名。
//! 3. 每个页面的编译结果 = 公共片段 + 该页面自己的片段，同名时页面片段覆盖公共片段。
//!
//! 构建完成后注册表只读，可被任意多个请求并发查询，不需要加锁。
//! 模板目录不可读、片段无法解析、或者某个页面的片段集中缺少共享入口片段
//! [`ENTRY_FRAGMENT`]，都是启动期的致命错误——一个默默缺失的页面只会在
//! 请求期才暴露，比启动失败糟糕得多。
//!
//! ## 片段语法
//!
//! - `{{> name}}`：内联名为 `name` 的片段（可递归，有深度上限）。
//! - `{{path.to.field}}`：在 JSON 数据值中按点路径取值，HTML 转义后写出；
//!   路径不存在时输出空字符串。
//! - 渲染始终从 `base` 片段开始，这与页面无关，是整个站点的共享布局入口。

use crate::exception::Exception;
use log::{debug, info};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// 共享入口片段名。每个页面的渲染都从这个片段开始。
pub const ENTRY_FRAGMENT: &str = "base";

/// 模板片段文件的扩展名
const FRAGMENT_EXTENSION: &str = "tmpl";

/// 片段内联的最大嵌套深度，用于阻断循环引用
const MAX_INCLUDE_DEPTH: usize = 16;

/// 一个页面的编译结果：片段名到片段源码的映射。
pub struct PageTemplate {
    fragments: HashMap<String, String>,
}

impl PageTemplate {
    /// 对给定的数据值执行模板，结果写入 `writer`。
    ///
    /// 执行是纯函数：相同的（模板, 数据）组合总是产生字节级一致的输出。
    /// 渲染错误（片段缺失、占位符未闭合、嵌套过深）通过 `RenderFailure` 返回，
    /// 调用方负责保证此时还没有任何字节写到网络上。
    pub fn execute<W: Write>(&self, writer: &mut W, data: &Value) -> Result<(), Exception> {
        self.render_fragment(ENTRY_FRAGMENT, writer, data, 0)
    }

    fn render_fragment<W: Write>(
        &self,
        name: &str,
        writer: &mut W,
        data: &Value,
        depth: usize,
    ) -> Result<(), Exception> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(Exception::RenderFailure(format!(
                "片段嵌套超过{}层，可能存在循环引用",
                MAX_INCLUDE_DEPTH
            )));
        }
        let source = self.fragments.get(name).ok_or_else(|| {
            Exception::RenderFailure(format!("引用的片段{}不存在", name))
        })?;

        let mut rest = source.as_str();
        loop {
            let open = match rest.find("{{") {
                Some(i) => i,
                None => {
                    write_text(writer, rest.as_bytes())?;
                    return Ok(());
                }
            };
            write_text(writer, rest[..open].as_bytes())?;

            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or_else(|| {
                Exception::RenderFailure(format!("片段{}中的占位符缺少闭合的}}}}", name))
            })?;
            let token = after[..close].trim();

            if let Some(fragment) = token.strip_prefix('>') {
                self.render_fragment(fragment.trim(), writer, data, depth + 1)?;
            } else {
                write_text(writer, escape_html(&lookup(data, token)).as_bytes())?;
            }
            rest = &after[close + 2..];
        }
    }

    // 启动期语法检查：确保每个片段的占位符都正确闭合
    fn validate(&self, page_name: &str) -> Result<(), Exception> {
        for (name, source) in &self.fragments {
            let mut rest = source.as_str();
            while let Some(open) = rest.find("{{") {
                let after = &rest[open + 2..];
                match after.find("}}") {
                    Some(close) => rest = &after[close + 2..],
                    None => {
                        return Err(Exception::StartupFatal(format!(
                            "页面{}的片段{}无法解析：占位符缺少闭合的}}}}",
                            page_name, name
                        )))
                    }
                }
            }
        }
        if !self.fragments.contains_key(ENTRY_FRAGMENT) {
            return Err(Exception::StartupFatal(format!(
                "页面{}的模板集中缺少共享入口片段{}",
                page_name, ENTRY_FRAGMENT
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn from_fragments(fragments: HashMap<String, String>) -> Self {
        Self { fragments }
    }
}

/// 页面名到编译模板的只读映射。
pub struct TemplateRegistry {
    pages: HashMap<String, PageTemplate>,
}

impl TemplateRegistry {
    /// 从模板根目录构建注册表。该函数在进程启动时被调用一次。
    ///
    /// 任何失败都是 `StartupFatal`：没有完整的模板集，进程不可能正确服务任何页面。
    pub fn build(root: &str) -> Result<Self, Exception> {
        let root = Path::new(root);
        let common = load_fragments(&root.join("common"))?;
        debug!("已加载{}个公共片段", common.len());

        let pages_dir = root.join("pages");
        let entries = fs::read_dir(&pages_dir).map_err(|e| {
            Exception::StartupFatal(format!(
                "无法读取页面模板目录{}：{}",
                pages_dir.display(),
                e
            ))
        })?;

        let mut pages = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Exception::StartupFatal(format!(
                    "枚举页面模板目录{}失败：{}",
                    pages_dir.display(),
                    e
                ))
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let page_name = entry.file_name().to_string_lossy().to_string();

            // 公共片段在前，页面片段在后覆盖同名项
            let mut fragments = common.clone();
            for (name, source) in load_fragments(&entry.path())? {
                fragments.insert(name, source);
            }

            let template = PageTemplate { fragments };
            template.validate(&page_name)?;
            info!(
                "页面模板编译完成：{}（{}个片段）",
                page_name,
                template.fragments.len()
            );
            pages.insert(page_name, template);
        }

        Ok(Self { pages })
    }

    /// 按页面名查询编译模板。注册表构建后不再变化，并发读取是安全的。
    pub fn get(&self, page_name: &str) -> Option<&PageTemplate> {
        self.pages.get(page_name)
    }

    /// 已注册的页面数量
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

// 读取一个目录下所有 .tmpl 片段，键为文件名去掉扩展名
fn load_fragments(dir: &Path) -> Result<HashMap<String, String>, Exception> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Exception::StartupFatal(format!("无法读取模板目录{}：{}", dir.display(), e))
    })?;

    let mut fragments = HashMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Exception::StartupFatal(format!("枚举模板目录{}失败：{}", dir.display(), e))
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(FRAGMENT_EXTENSION) {
            continue;
        }
        let name = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        let source = fs::read_to_string(&path).map_err(|e| {
            Exception::StartupFatal(format!("无法读取模板片段{}：{}", path.display(), e))
        })?;
        fragments.insert(name, source);
    }
    Ok(fragments)
}

fn write_text<W: Write>(writer: &mut W, data: &[u8]) -> Result<(), Exception> {
    writer
        .write_all(data)
        .map_err(|e| Exception::WriteFailure(e.to_string()))
}

// 在 JSON 数据值中按点路径取值。路径不存在时返回空字符串。
fn lookup(data: &Value, path: &str) -> String {
    let mut current = data;
    for segment in path.split('.') {
        current = match current.get(segment) {
            Some(v) => v,
            None => return String::new(),
        };
    }
    match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
