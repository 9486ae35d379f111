// ============================================================================
// Scanner - 单文件分析流水线
// ============================================================================
//
// file -> tree -> MessageSourceExtractor -> HandlerResolver -> SinkAuditor
//
// 订阅识别和 sink 扫描挂在同一次遍历上；handler 解析按需再走一次。
// 每个文件的状态 (别名表、提取结果) 完全独立，可以安全地并行处理。

pub mod handler_resolver;
pub mod markup;
pub mod message_extractor;
pub mod sink_auditor;
pub mod syntax;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Tree};

use self::handler_resolver::HandlerResolver;
use self::markup::MarkupScripts;
use self::message_extractor::MessageSourceExtractor;
use self::sink_auditor::SinkAuditor;
use self::syntax::{Grammar, ParseError, SyntaxTree, Visitor};

// ============================================================================
// 文件类型
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Html,
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
}

impl FileKind {
    /// 按扩展名识别 (不区分大小写)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" => Some(FileKind::Html),
            "js" => Some(FileKind::JavaScript),
            "ts" => Some(FileKind::TypeScript),
            "jsx" => Some(FileKind::Jsx),
            "tsx" => Some(FileKind::Tsx),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Html => "html",
            FileKind::JavaScript => "javascript",
            FileKind::TypeScript => "typescript",
            FileKind::Jsx => "jsx",
            FileKind::Tsx => "tsx",
        }
    }

    pub fn grammar(self) -> Grammar {
        match self {
            FileKind::Html | FileKind::JavaScript | FileKind::Jsx => Grammar::JavaScript,
            FileKind::TypeScript => Grammar::TypeScript,
            FileKind::Tsx => Grammar::Tsx,
        }
    }
}

// ============================================================================
// 数据模型
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// addEventListener("message", ...)
    Listener,
    /// onmessage = ...
    Assignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTag {
    Window,
    WindowAlias,
}

/// 一个 message 订阅点
#[derive(Debug, Clone, Copy)]
pub struct MessageSource<'a> {
    pub kind: SourceKind,
    pub target: TargetTag,
    pub handler: Node<'a>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    InlineFunction,
    InlineArrow,
    ExternalReference,
}

/// 形参描述: 简单名称，或解构等绑定模式的结构类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameter {
    Name(String),
    Pattern(String),
}

impl Parameter {
    pub fn label(&self) -> &str {
        match self {
            Parameter::Name(name) => name,
            Parameter::Pattern(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedHandler {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub target: TargetTag,
    pub line: usize,
    pub handler_kind: HandlerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub resolved: bool,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum VulnerabilityKind {
    EvalUsage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(rename = "type")]
    pub kind: VulnerabilityKind,
    pub line: usize,
    pub code: String,
}

/// 单文件报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub file_path: String,
    pub vulnerabilities: Vec<Vulnerability>,
    pub message_listeners: Vec<ResolvedHandler>,
}

impl SecurityReport {
    pub fn empty(file_path: String) -> Self {
        Self {
            file_path,
            vulnerabilities: Vec::new(),
            message_listeners: Vec::new(),
        }
    }
}

// ============================================================================
// FileUnit
// ============================================================================

/// 一个待分析文件: 路径、原文、解析结果
pub struct FileUnit {
    pub path: PathBuf,
    pub kind: FileKind,
    pub text: String,
    /// HTML 文件提取出的脚本源码
    pub markup: Option<MarkupScripts>,
    pub tree: Option<Tree>,
    pub parse_error: Option<ParseError>,
}

impl FileUnit {
    pub fn new(path: impl Into<PathBuf>, kind: FileKind, text: String) -> Self {
        let markup = match kind {
            FileKind::Html => Some(markup::extract_scripts(&text)),
            _ => None,
        };

        let source = markup.as_ref().map_or(text.as_str(), |m| m.source.as_str());
        let (tree, parse_error) = match parse_for_kind(source, kind) {
            Ok(tree) => (Some(tree), None),
            Err(e) => (None, Some(e)),
        };

        Self {
            path: path.into(),
            kind,
            text,
            markup,
            tree,
            parse_error,
        }
    }

    /// 交给语法分析的源码 (HTML 为提取后的脚本)
    pub fn source(&self) -> &str {
        self.markup.as_ref().map_or(self.text.as_str(), |m| m.source.as_str())
    }

    pub fn syntax(&self) -> Option<SyntaxTree<'_>> {
        self.tree.as_ref().map(|tree| SyntaxTree::new(tree, self.source()))
    }
}

/// JavaScript 解析失败时用 TSX 语法重试一次 (带类型标注的 .js 文件)
fn parse_for_kind(source: &str, kind: FileKind) -> Result<Tree, ParseError> {
    let grammar = kind.grammar();
    match syntax::parse(source, grammar) {
        Ok(tree) => Ok(tree),
        Err(first) if grammar == Grammar::JavaScript => {
            syntax::parse(source, Grammar::Tsx).map_err(|_| first)
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// 流水线
// ============================================================================

/// 分析单个文件，解析失败时返回空报告
pub fn analyze(unit: &FileUnit) -> SecurityReport {
    let file_path = unit.path.display().to_string();
    let Some(tree) = unit.syntax() else {
        return SecurityReport::empty(file_path);
    };

    let extractor = MessageSourceExtractor::new();
    let auditor = SinkAuditor::new();

    let mut subscriptions = extractor.visitor();
    let mut sinks = auditor.scanner(&unit.text);
    {
        let mut visitors: [&mut dyn Visitor<'_>; 2] = [&mut subscriptions, &mut sinks];
        syntax::traverse(&tree, &mut visitors);
    }
    let sources = subscriptions.finish();
    let vulnerabilities = sinks.finish();

    let resolver = HandlerResolver::new(tree);
    let handlers = sources.iter().map(|source| resolver.resolve(source)).collect();

    auditor.assemble(file_path, vulnerabilities, handlers)
}

/// 直接分析一段源码 (不经过文件系统)
pub fn analyze_source(path: &str, code: &str) -> Result<SecurityReport, ParseError> {
    let kind = FileKind::from_path(Path::new(path)).unwrap_or(FileKind::JavaScript);
    let unit = FileUnit::new(path, kind, code.to_string());
    if let Some(e) = &unit.parse_error {
        return Err(e.clone());
    }
    Ok(analyze(&unit))
}
