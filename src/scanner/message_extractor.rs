// ============================================================================
// MessageSourceExtractor - 识别 message 事件订阅
// ============================================================================
//
// 支持的形式:
// 1. window.addEventListener("message", handler[, options])
// 2. window.onmessage = handler
// 3. 以上两种形式作用于 window 别名 (const w = window; w.onmessage = ...)
//
// 别名发现与订阅识别在同一次遍历中完成，顺序相关:
// 别名必须在使用之前 (按遍历顺序) 被声明或赋值。

use tree_sitter::Node;

use super::syntax::{
    self, is_identifier_named, named_children, object_path_of, string_literal_value,
    unwrap_parens, NodeKind, SyntaxTree, Visitor,
};
use super::{MessageSource, SourceKind, TargetTag};
use crate::symbol_table::AliasTable;

/// 全局消息目标
pub const GLOBAL_TARGET: &str = "window";
const MESSAGE_EVENT: &str = "message";
const LISTENER_METHOD: &str = "addEventListener";
const HANDLER_PROPERTY: &str = "onmessage";

#[derive(Debug, Default, Clone, Copy)]
pub struct MessageSourceExtractor;

impl MessageSourceExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 新建一个单文件提取上下文 (每次调用都是全新的别名表)
    pub fn visitor<'a>(&self) -> ExtractionContext<'a> {
        ExtractionContext {
            aliases: AliasTable::new(),
            sources: Vec::new(),
        }
    }

    /// 独立遍历一次树，返回全部订阅点
    pub fn extract<'a>(&self, tree: &SyntaxTree<'a>) -> Vec<MessageSource<'a>> {
        let mut ctx = self.visitor();
        syntax::traverse(tree, &mut [&mut ctx]);
        ctx.finish()
    }
}

/// 单文件提取状态，随遍历线程化传递
pub struct ExtractionContext<'a> {
    aliases: AliasTable,
    sources: Vec<MessageSource<'a>>,
}

impl<'a> ExtractionContext<'a> {
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn finish(self) -> Vec<MessageSource<'a>> {
        self.sources
    }

    /// `const w = window` / `w = window`
    fn track_alias(
        &mut self,
        tree: &SyntaxTree<'a>,
        target: Option<Node<'a>>,
        value: Option<Node<'a>>,
    ) {
        let (Some(target), Some(value)) = (target, value) else {
            return;
        };
        if target.kind() == "identifier" && is_identifier_named(tree, value, GLOBAL_TARGET) {
            let name = tree.text(&target);
            tracing::trace!(alias = name, "window alias recorded");
            self.aliases.record(name, true);
        }
    }

    /// 成员访问的接收者是否为 window 或已知别名
    fn classify_target(&self, tree: &SyntaxTree<'a>, object: Node<'a>) -> Option<TargetTag> {
        let object = unwrap_parens(object);
        if object.kind() != "identifier" {
            return None;
        }
        let path = object_path_of(tree, object);
        if path == GLOBAL_TARGET {
            Some(TargetTag::Window)
        } else if self.aliases.is_alias(&path) {
            Some(TargetTag::WindowAlias)
        } else {
            None
        }
    }

    /// `<target>.<property>` 形式的成员访问，返回接收者分类
    fn member_on_target(
        &self,
        tree: &SyntaxTree<'a>,
        node: Node<'a>,
        property: &str,
    ) -> Option<TargetTag> {
        let member = unwrap_parens(node);
        if member.kind() != "member_expression" {
            return None;
        }
        let name = member.child_by_field_name("property")?;
        if tree.text(&name) != property {
            return None;
        }
        self.classify_target(tree, member.child_by_field_name("object")?)
    }

    fn listener_call(&self, tree: &SyntaxTree<'a>, call: Node<'a>) -> Option<MessageSource<'a>> {
        let callee = call.child_by_field_name("function")?;
        let target = self.member_on_target(tree, callee, LISTENER_METHOD)?;

        let args = named_children(call.child_by_field_name("arguments")?);
        if args.len() < 2 {
            return None;
        }
        if string_literal_value(tree, args[0])? != MESSAGE_EVENT {
            return None;
        }

        // 第三个参数 (options) 只接受，不解释
        Some(MessageSource {
            kind: SourceKind::Listener,
            target,
            handler: args[1],
            line: syntax::line_of(&call),
        })
    }

    fn handler_assignment(
        &self,
        tree: &SyntaxTree<'a>,
        assignment: Node<'a>,
    ) -> Option<MessageSource<'a>> {
        let left = assignment.child_by_field_name("left")?;
        let target = self.member_on_target(tree, left, HANDLER_PROPERTY)?;
        Some(MessageSource {
            kind: SourceKind::Assignment,
            target,
            handler: assignment.child_by_field_name("right")?,
            line: syntax::line_of(&assignment),
        })
    }
}

impl<'a> Visitor<'a> for ExtractionContext<'a> {
    fn visit(&mut self, tree: &SyntaxTree<'a>, kind: NodeKind, node: Node<'a>) {
        match kind {
            NodeKind::VariableDeclarator => {
                let name = node.child_by_field_name("name");
                self.track_alias(tree, name, node.child_by_field_name("value"));
            }
            NodeKind::AssignmentExpression => {
                let left = node.child_by_field_name("left");
                self.track_alias(tree, left, node.child_by_field_name("right"));
                if let Some(source) = self.handler_assignment(tree, node) {
                    self.sources.push(source);
                }
            }
            NodeKind::CallExpression => {
                if let Some(source) = self.listener_call(tree, node) {
                    self.sources.push(source);
                }
            }
            NodeKind::FunctionDeclaration => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::syntax::{parse, Grammar};

    fn extract(code: &str) -> Vec<(SourceKind, TargetTag, usize, String)> {
        let tree = parse(code, Grammar::JavaScript).unwrap();
        let view = SyntaxTree::new(&tree, code);
        MessageSourceExtractor::new()
            .extract(&view)
            .into_iter()
            .map(|s| (s.kind, s.target, s.line, view.text(&s.handler).to_string()))
            .collect()
    }

    #[test]
    fn test_no_subscription_yields_nothing() {
        let code = r#"
            const x = 1;
            function f(a) { return a + 1; }
            console.log(f(x));
        "#;
        assert!(extract(code).is_empty());
    }

    #[test]
    fn test_listener_with_and_without_options() {
        let code = r#"
window.addEventListener("message", onMsg);
window.addEventListener('message', onMsg, { once: true });
"#;
        let sources = extract(code);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0], (SourceKind::Listener, TargetTag::Window, 2, "onMsg".to_string()));
        assert_eq!(sources[1].2, 3);
    }

    #[test]
    fn test_wrong_event_name_is_ignored() {
        let code = r#"
            window.addEventListener("click", onMsg);
            window.addEventListener(`message`, onMsg);
            window.addEventListener("message");
        "#;
        assert!(extract(code).is_empty());
    }

    #[test]
    fn test_unrelated_targets_are_ignored() {
        let code = r#"
            document.addEventListener("message", onMsg);
            port.addEventListener("message", onMsg);
            iframe.onmessage = onMsg;
            window.frames.onmessage = onMsg;
            window.onmessageerror = onMsg;
        "#;
        assert!(extract(code).is_empty());
    }

    #[test]
    fn test_alias_declaration_and_assignment() {
        let code = r#"
const w = window;
let v;
v = (window);
w.addEventListener("message", function (e) {});
v.onmessage = (e) => {};
"#;
        let sources = extract(code);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].0, SourceKind::Listener);
        assert_eq!(sources[0].1, TargetTag::WindowAlias);
        assert_eq!(sources[0].2, 5);
        assert_eq!(sources[1].0, SourceKind::Assignment);
        assert_eq!(sources[1].1, TargetTag::WindowAlias);
    }

    #[test]
    fn test_alias_used_before_declaration_is_not_tracked() {
        let code = r#"
            w.addEventListener("message", handler);
            var w = window;
        "#;
        assert!(extract(code).is_empty());
    }

    #[test]
    fn test_alias_is_not_scope_aware() {
        // 不同作用域的同名变量共享同一张表
        let code = r#"
            function setup() { const target = window; }
            function other(target) { target.addEventListener("message", handler); }
        "#;
        let sources = extract(code);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].1, TargetTag::WindowAlias);
    }

    #[test]
    fn test_nested_in_control_flow_still_matches() {
        let code = r#"
            if (typeof window !== "undefined") {
                window.addEventListener("message", h);
            }
            for (const x of xs) {
                while (x) { window.onmessage = h; }
            }
        "#;
        let sources = extract(code);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].0, SourceKind::Listener);
        assert_eq!(sources[1].0, SourceKind::Assignment);
    }

    #[test]
    fn test_fresh_alias_table_per_extraction() {
        let extractor = MessageSourceExtractor::new();

        let first = "const w = window;";
        let tree = parse(first, Grammar::JavaScript).unwrap();
        let view = SyntaxTree::new(&tree, first);
        let mut ctx = extractor.visitor();
        syntax::traverse(&view, &mut [&mut ctx]);
        assert!(ctx.aliases().is_alias("w"));

        let second = r#"w.addEventListener("message", h);"#;
        let tree = parse(second, Grammar::JavaScript).unwrap();
        let view = SyntaxTree::new(&tree, second);
        assert!(extractor.extract(&view).is_empty());
    }
}
