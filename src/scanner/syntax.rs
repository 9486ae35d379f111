// ============================================================================
// Syntax-tree capability - tree-sitter 解析与单遍遍历
// ============================================================================
//
// 所有分析器只依赖本模块暴露的窄接口:
// - parse(): 文本 -> Tree (失败时返回 ParseError)
// - traverse(): 单次深度优先前序遍历，可同时挂载多个 Visitor
// - location_of() / object_path_of(): 节点定位与成员链命名
//
// ============================================================================

use std::cell::RefCell;
use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Tree};

/// 解析失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("failed to load {grammar} grammar: {reason}")]
    Language { grammar: &'static str, reason: String },

    #[error("parser produced no tree")]
    NoTree,

    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
}

/// 可用语法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Grammar {
    fn slot(self) -> usize {
        match self {
            Grammar::JavaScript => 0,
            Grammar::TypeScript => 1,
            Grammar::Tsx => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Grammar::JavaScript => "javascript",
            Grammar::TypeScript => "typescript",
            Grammar::Tsx => "tsx",
        }
    }

    fn language(self) -> Language {
        match self {
            Grammar::JavaScript => tree_sitter_javascript::language(),
            Grammar::TypeScript => tree_sitter_typescript::language_typescript(),
            Grammar::Tsx => tree_sitter_typescript::language_tsx(),
        }
    }
}

// ============================================================================
// thread_local Parser 复用
// ============================================================================
//
// Parser::new() 和 set_language() 涉及 native 层初始化。
// 每个线程、每种语法只初始化一次，rayon 工作线程之间互不共享。
//
// ============================================================================

thread_local! {
    static PARSERS: RefCell<[Option<Parser>; 3]> = const { RefCell::new([None, None, None]) };
}

fn with_parser<F, R>(grammar: Grammar, f: F) -> Result<R, ParseError>
where
    F: FnOnce(&mut Parser) -> Result<R, ParseError>,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let slot = &mut parsers[grammar.slot()];

        if slot.is_none() {
            let mut parser = Parser::new();
            parser
                .set_language(&grammar.language())
                .map_err(|e| ParseError::Language {
                    grammar: grammar.name(),
                    reason: e.to_string(),
                })?;
            *slot = Some(parser);
        }

        match slot.as_mut() {
            Some(parser) => f(parser),
            None => Err(ParseError::NoTree),
        }
    })
}

/// 解析源码。树中存在 ERROR / MISSING 节点时视为解析失败。
pub fn parse(text: &str, grammar: Grammar) -> Result<Tree, ParseError> {
    let tree = with_parser(grammar, |parser| {
        parser.parse(text, None).ok_or(ParseError::NoTree)
    })?;

    if tree.root_node().has_error() {
        let (line, column) = first_error(tree.root_node())
            .map(|node| location_of(&node))
            .unwrap_or((0, 0));
        return Err(ParseError::Syntax { line, column });
    }

    Ok(tree)
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        // 只下探包含错误的子树
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// 已解析的树与其源码的只读视图
#[derive(Clone, Copy)]
pub struct SyntaxTree<'a> {
    tree: &'a Tree,
    source: &'a str,
}

impl<'a> SyntaxTree<'a> {
    pub fn new(tree: &'a Tree, source: &'a str) -> Self {
        Self { tree, source }
    }

    pub fn root(&self) -> Node<'a> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// 节点对应的源码文本
    pub fn text(&self, node: &Node<'a>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }
}

// ============================================================================
// 遍历: 封闭的节点种类集合 + Visitor
// ============================================================================

/// 分析器关心的节点种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    VariableDeclarator,
    AssignmentExpression,
    CallExpression,
    FunctionDeclaration,
}

impl NodeKind {
    pub fn of(node: &Node<'_>) -> Option<Self> {
        match node.kind() {
            "variable_declarator" => Some(NodeKind::VariableDeclarator),
            "assignment_expression" => Some(NodeKind::AssignmentExpression),
            "call_expression" => Some(NodeKind::CallExpression),
            "function_declaration" | "generator_function_declaration" => {
                Some(NodeKind::FunctionDeclaration)
            }
            _ => None,
        }
    }
}

pub trait Visitor<'a> {
    fn visit(&mut self, tree: &SyntaxTree<'a>, kind: NodeKind, node: Node<'a>);
}

/// 单次深度优先前序遍历，每个匹配节点依次分发给所有 visitor
pub fn traverse<'a>(tree: &SyntaxTree<'a>, visitors: &mut [&mut dyn Visitor<'a>]) {
    let mut cursor = tree.root().walk();
    loop {
        let node = cursor.node();
        if let Some(kind) = NodeKind::of(&node) {
            for visitor in visitors.iter_mut() {
                visitor.visit(tree, kind, node);
            }
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

// ============================================================================
// 节点形状谓词
// ============================================================================

/// (line, column)，行号从 1 开始
pub fn location_of(node: &Node<'_>) -> (usize, usize) {
    let pos = node.start_position();
    (pos.row + 1, pos.column)
}

pub fn line_of(node: &Node<'_>) -> usize {
    location_of(node).0
}

/// 去掉包裹表达式的括号: `((window))` -> `window`
pub fn unwrap_parens(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        match named_children(node).into_iter().next() {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// 不含注释的具名子节点
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

/// 将成员访问链解析为点分名称: `a.b.c` -> "a.b.c"
pub fn object_path_of<'a>(tree: &SyntaxTree<'a>, node: Node<'a>) -> String {
    let node = unwrap_parens(node);
    match node.kind() {
        "identifier" | "this" => tree.text(&node).to_string(),
        "member_expression" => {
            let object = node.child_by_field_name("object");
            let property = node.child_by_field_name("property");
            match (object, property) {
                (Some(object), Some(property)) => {
                    format!("{}.{}", object_path_of(tree, object), tree.text(&property))
                }
                _ => "unknown".to_string(),
            }
        }
        _ => "unknown".to_string(),
    }
}

pub fn is_identifier_named(tree: &SyntaxTree<'_>, node: Node<'_>, name: &str) -> bool {
    let node = unwrap_parens(node);
    node.kind() == "identifier" && tree.text(&node) == name
}

/// 普通字符串字面量的值 (模板字符串不算)
pub fn string_literal_value<'a>(tree: &SyntaxTree<'a>, node: Node<'a>) -> Option<&'a str> {
    let node = unwrap_parens(node);
    if node.kind() != "string" {
        return None;
    }
    let raw = tree.text(&node);
    if raw.len() < 2 {
        return None;
    }
    raw.get(1..raw.len() - 1)
}

pub fn is_function_literal(node: &Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function" | "function_expression" | "generator_function"
    )
}

pub fn is_arrow_function(node: &Node<'_>) -> bool {
    node.kind() == "arrow_function"
}
