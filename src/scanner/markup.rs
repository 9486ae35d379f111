//! HTML 内联脚本提取
//!
//! 不引入完整的 HTML parser: 用正则定位 `<script>` 块，
//! 把脚本体以外的字节全部替换为空格 (保留换行)，得到与原文件
//! 行列号一一对应的脚本源码，交给 JavaScript 语法解析。
//!
//! 每个脚本块结束处写入 U+2028 + `;`: U+2028 在 JavaScript 中是行终止符
//! (结束 `//` 注释)，但 tree-sitter 不把它计为新行，行号保持不变。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("valid script regex")
});

static TYPE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:^|\s)type\s*=\s*["']?([^"'\s>]+)"#).expect("valid type regex")
});

static SRC_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\s)src\s*=").expect("valid src regex"));

/// 块结束分隔符: LINE SEPARATOR + `;`
const BLOCK_TERMINATOR: &[u8] = "\u{2028};".as_bytes();

/// 页面中的脚本统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCounts {
    /// 参与分析的内联 JavaScript 块
    pub inline_scripts: usize,
    /// 带 src 属性的块
    pub external_scripts: usize,
    /// 全部 <script> 标签
    pub script_count: usize,
}

/// 从 HTML 中提取出的脚本
#[derive(Debug, Clone, Default)]
pub struct MarkupScripts {
    /// 与原文件等长、行号一致的脚本源码
    pub source: String,
    pub counts: ScriptCounts,
}

fn is_javascript_type(attrs: &str) -> bool {
    let Some(caps) = TYPE_ATTR.captures(attrs) else {
        return true;
    };
    let mime = caps[1].to_ascii_lowercase();
    matches!(
        mime.as_str(),
        "module"
            | "text/javascript"
            | "application/javascript"
            | "text/ecmascript"
            | "application/ecmascript"
            | "text/jsx"
            | "text/babel"
    )
}

pub fn extract_scripts(html: &str) -> MarkupScripts {
    let bytes = html.as_bytes();
    let mut out: Vec<u8> = bytes
        .iter()
        .map(|&b| if b == b'\n' { b'\n' } else { b' ' })
        .collect();

    let mut scripts = MarkupScripts::default();

    for caps in SCRIPT_BLOCK.captures_iter(html) {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let Some(body) = caps.get(2) else { continue };

        scripts.counts.script_count += 1;
        if SRC_ATTR.is_match(attrs) {
            scripts.counts.external_scripts += 1;
        }
        if !is_javascript_type(attrs) {
            tracing::debug!(attrs = attrs.trim(), "skipping non-javascript script block");
            continue;
        }
        if body.as_str().trim().is_empty() {
            continue;
        }

        scripts.counts.inline_scripts += 1;
        out[body.range()].copy_from_slice(&bytes[body.range()]);
        // 闭合标签 `</script` 至少 8 字节，分隔符写在其位置上
        let end = body.end();
        out[end..end + BLOCK_TERMINATOR.len()].copy_from_slice(BLOCK_TERMINATOR);
    }

    // 只写入了 ASCII、完整的 U+2028 和原文中完整的 UTF-8 片段
    scripts.source = String::from_utf8(out).unwrap_or_default();
    scripts
}
