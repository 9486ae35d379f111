// ============================================================================
// SinkAuditor - 危险 sink 检测与报告组装
// ============================================================================
//
// 每种 sink 是一个 SinkRule: 结构谓词 + Vulnerability 记录。
// 新 sink (innerHTML 赋值、document.write、字符串 setTimeout、new Function)
// 只需实现 SinkRule 并注册到 SinkAuditor::new()。
//
// 检测不受 handler 可达性约束: 文件中任意位置的 eval(...) 都会上报。

use tree_sitter::Node;

use super::syntax::{self, is_identifier_named, NodeKind, SyntaxTree, Visitor};
use super::{ResolvedHandler, SecurityReport, Vulnerability, VulnerabilityKind};

/// sink 规则处理上下文
pub struct SinkContext<'a, 't> {
    pub tree: &'t SyntaxTree<'a>,
    /// 原始文件文本 (用于代码片段)
    pub text: &'t str,
}

/// sink 规则 trait
pub trait SinkRule: Send + Sync {
    fn id(&self) -> VulnerabilityKind;

    /// 检查节点，命中时返回漏洞记录
    fn check<'a>(
        &self,
        kind: NodeKind,
        node: Node<'a>,
        ctx: &SinkContext<'a, '_>,
    ) -> Option<Vulnerability>;
}

/// 直接调用 eval(...)
pub struct EvalCallRule;

impl SinkRule for EvalCallRule {
    fn id(&self) -> VulnerabilityKind {
        VulnerabilityKind::EvalUsage
    }

    fn check<'a>(
        &self,
        kind: NodeKind,
        node: Node<'a>,
        ctx: &SinkContext<'a, '_>,
    ) -> Option<Vulnerability> {
        match kind {
            NodeKind::CallExpression => {
                let callee = node.child_by_field_name("function")?;
                if !is_identifier_named(ctx.tree, callee, "eval") {
                    return None;
                }
                let line = syntax::line_of(&node);
                Some(Vulnerability {
                    kind: self.id(),
                    line,
                    code: code_line(ctx.text, line),
                })
            }
            NodeKind::VariableDeclarator
            | NodeKind::AssignmentExpression
            | NodeKind::FunctionDeclaration => None,
        }
    }
}

pub struct SinkAuditor {
    rules: Vec<Box<dyn SinkRule>>,
}

impl Default for SinkAuditor {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkAuditor {
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(EvalCallRule)],
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn SinkRule>>) -> Self {
        Self { rules }
    }

    /// 作为 visitor 挂到共享遍历上
    pub fn scanner<'s>(&'s self, text: &'s str) -> SinkScanner<'s> {
        SinkScanner {
            rules: &self.rules,
            text,
            findings: Vec::new(),
        }
    }

    /// 独立遍历一次树
    pub fn scan(&self, tree: &SyntaxTree<'_>, text: &str) -> Vec<Vulnerability> {
        let mut scanner = self.scanner(text);
        syntax::traverse(tree, &mut [&mut scanner]);
        scanner.finish()
    }

    /// 组装最终报告: 两个列表并列，不做关联
    pub fn assemble(
        &self,
        file_path: String,
        vulnerabilities: Vec<Vulnerability>,
        handlers: Vec<ResolvedHandler>,
    ) -> SecurityReport {
        SecurityReport {
            file_path,
            vulnerabilities,
            message_listeners: handlers,
        }
    }

    pub fn audit(
        &self,
        tree: &SyntaxTree<'_>,
        text: &str,
        file_path: String,
        handlers: Vec<ResolvedHandler>,
    ) -> SecurityReport {
        let vulnerabilities = self.scan(tree, text);
        self.assemble(file_path, vulnerabilities, handlers)
    }
}

pub struct SinkScanner<'s> {
    rules: &'s [Box<dyn SinkRule>],
    text: &'s str,
    findings: Vec<Vulnerability>,
}

impl SinkScanner<'_> {
    pub fn finish(self) -> Vec<Vulnerability> {
        self.findings
    }
}

impl<'a> Visitor<'a> for SinkScanner<'_> {
    fn visit(&mut self, tree: &SyntaxTree<'a>, kind: NodeKind, node: Node<'a>) {
        let ctx = SinkContext { tree, text: self.text };
        for rule in self.rules {
            if let Some(found) = rule.check(kind, node, &ctx) {
                self.findings.push(found);
            }
        }
    }
}

/// 按 1 开始的行号取出该行并去掉首尾空白；越界或 0 返回空串
pub fn code_line(text: &str, line: usize) -> String {
    if line == 0 {
        return String::new();
    }
    text.split('\n')
        .nth(line - 1)
        .map(|l| l.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::syntax::{parse, Grammar};
    use proptest::prelude::*;

    fn scan(code: &str) -> Vec<Vulnerability> {
        let tree = parse(code, Grammar::JavaScript).unwrap();
        let view = SyntaxTree::new(&tree, code);
        SinkAuditor::new().scan(&view, code)
    }

    #[test]
    fn test_eval_reported_with_trimmed_line() {
        let code = "const a = 1;\n    eval(x);   \nfoo();\n";
        let found = scan(code);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, VulnerabilityKind::EvalUsage);
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].code, "eval(x);");
    }

    #[test]
    fn test_eval_reported_outside_handlers() {
        let code = r#"
            function unrelated(input) { return eval(input); }
            window.addEventListener("message", (e) => { eval(e.data); });
        "#;
        assert_eq!(scan(code).len(), 2);
    }

    #[test]
    fn test_non_bare_eval_is_ignored() {
        let code = r#"
            window.eval(x);
            obj.eval(x);
            evaluate(x);
            const e = "eval(x)";
        "#;
        assert!(scan(code).is_empty());
    }

    #[test]
    fn test_parenthesized_eval_callee() {
        let code = "(eval)(payload);";
        assert_eq!(scan(code).len(), 1);
    }

    #[test]
    fn test_code_line_out_of_range() {
        assert_eq!(code_line("a\nb", 0), "");
        assert_eq!(code_line("a\nb", 3), "");
        assert_eq!(code_line("a\r\n  b  ", 2), "b");
    }

    #[test]
    fn test_assemble_concatenates_lists() {
        let auditor = SinkAuditor::new();
        let report = auditor.assemble("a.js".to_string(), Vec::new(), Vec::new());
        assert_eq!(report.file_path, "a.js");
        assert!(report.vulnerabilities.is_empty());
        assert!(report.message_listeners.is_empty());
    }

    /// 字符串形式的 setTimeout 等价于 eval
    struct StringTimerRule;

    impl SinkRule for StringTimerRule {
        fn id(&self) -> VulnerabilityKind {
            VulnerabilityKind::EvalUsage
        }

        fn check<'a>(
            &self,
            kind: NodeKind,
            node: Node<'a>,
            ctx: &SinkContext<'a, '_>,
        ) -> Option<Vulnerability> {
            if kind != NodeKind::CallExpression {
                return None;
            }
            let callee = node.child_by_field_name("function")?;
            if !is_identifier_named(ctx.tree, callee, "setTimeout") {
                return None;
            }
            let args = syntax::named_children(node.child_by_field_name("arguments")?);
            syntax::string_literal_value(ctx.tree, *args.first()?)?;
            let line = syntax::line_of(&node);
            Some(Vulnerability {
                kind: self.id(),
                line,
                code: code_line(ctx.text, line),
            })
        }
    }

    #[test]
    fn test_audit_with_registered_rules() {
        let code = "eval(a);\nsetTimeout(\"run()\", 10);\nsetTimeout(run, 10);\n";
        let tree = parse(code, Grammar::JavaScript).unwrap();
        let view = SyntaxTree::new(&tree, code);

        let rules: Vec<Box<dyn SinkRule>> = vec![Box::new(EvalCallRule), Box::new(StringTimerRule)];
        let auditor = SinkAuditor::with_rules(rules);
        let report = auditor.audit(&view, code, "timers.js".to_string(), Vec::new());

        assert_eq!(report.file_path, "timers.js");
        let lines: Vec<usize> = report.vulnerabilities.iter().map(|v| v.line).collect();
        assert_eq!(lines, vec![1, 2]);
        assert_eq!(report.vulnerabilities[1].code, "setTimeout(\"run()\", 10);");
        assert!(report.message_listeners.is_empty());
    }

    #[test]
    fn test_empty_registry_finds_nothing() {
        let code = "eval(a);";
        let tree = parse(code, Grammar::JavaScript).unwrap();
        let view = SyntaxTree::new(&tree, code);

        let auditor = SinkAuditor::with_rules(Vec::new());
        assert!(auditor.scan(&view, code).is_empty());
    }

    proptest! {
        #[test]
        fn prop_code_line_never_panics(text in ".{0,200}", line in 0usize..64) {
            let snippet = code_line(&text, line);
            prop_assert_eq!(snippet.trim(), snippet.as_str());
            if line == 0 || line > text.split('\n').count() {
                prop_assert!(snippet.is_empty());
            }
        }
    }
}
