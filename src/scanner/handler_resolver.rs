// ============================================================================
// HandlerResolver - 将 handler 引用还原为函数形状与参数列表
// ============================================================================
//
// - 函数字面量 / 箭头函数: 直接读取形参
// - 裸标识符: 全文件查找同名 function 声明或以函数字面量初始化的变量
//   (不区分作用域，按遍历顺序最后一个匹配生效)
// - 查找失败: 以标识符本身作为唯一的合成参数，标记为未解析
//
// 纯诊断用途: sink 扫描不依赖这里的结果。

use once_cell::unsync::OnceCell;
use tree_sitter::Node;

use super::syntax::{
    self, is_arrow_function, is_function_literal, named_children, object_path_of, unwrap_parens,
    NodeKind, SyntaxTree, Visitor,
};
use super::{HandlerKind, MessageSource, Parameter, ResolvedHandler};
use crate::symbol_table::{FlatSymbolTable, SymbolLookup};

/// 声明处的函数形状
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionShape {
    pub parameters: Vec<Parameter>,
}

pub struct HandlerResolver<'a> {
    tree: SyntaxTree<'a>,
    /// 首次遇到裸标识符 handler 时才构建
    functions: OnceCell<FlatSymbolTable<FunctionShape>>,
}

impl<'a> HandlerResolver<'a> {
    pub fn new(tree: SyntaxTree<'a>) -> Self {
        Self {
            tree,
            functions: OnceCell::new(),
        }
    }

    pub fn resolve(&self, source: &MessageSource<'a>) -> ResolvedHandler {
        let handler = unwrap_parens(source.handler);

        let (handler_kind, parameters, reference, resolved) = if is_function_literal(&handler) {
            (HandlerKind::InlineFunction, self.parameters_of(handler), None, true)
        } else if is_arrow_function(&handler) {
            (HandlerKind::InlineArrow, self.parameters_of(handler), None, true)
        } else if handler.kind() == "identifier" {
            let name = self.tree.text(&handler);
            match self.function_table().lookup(name) {
                Some(shape) => {
                    let parameters = shape.parameters.clone();
                    (HandlerKind::ExternalReference, parameters, Some(name.to_string()), true)
                }
                None => {
                    tracing::debug!(
                        handler = name,
                        line = source.line,
                        "external handler not found in file"
                    );
                    let parameters = vec![Parameter::Name(name.to_string())];
                    (HandlerKind::ExternalReference, parameters, Some(name.to_string()), false)
                }
            }
        } else {
            // this.onMessage / handler.bind(this) 等
            let label = if handler.kind() == "member_expression" {
                object_path_of(&self.tree, handler)
            } else {
                handler.kind().to_string()
            };
            let parameters = vec![Parameter::Name(label.clone())];
            (HandlerKind::ExternalReference, parameters, Some(label), false)
        };

        ResolvedHandler {
            kind: source.kind,
            target: source.target,
            line: source.line,
            handler_kind,
            reference,
            resolved,
            parameters,
        }
    }

    fn function_table(&self) -> &FlatSymbolTable<FunctionShape> {
        self.functions.get_or_init(|| {
            let mut collector = FunctionCollector {
                table: FlatSymbolTable::new(),
            };
            syntax::traverse(&self.tree, &mut [&mut collector]);
            collector.table
        })
    }

    fn parameters_of(&self, function: Node<'a>) -> Vec<Parameter> {
        parameters_of(&self.tree, function)
    }
}

/// 读取函数节点的形参列表
pub fn parameters_of<'a>(tree: &SyntaxTree<'a>, function: Node<'a>) -> Vec<Parameter> {
    // 箭头函数单参数无括号: `e => ...`
    if let Some(single) = function.child_by_field_name("parameter") {
        return vec![describe_parameter(tree, single)];
    }
    match function.child_by_field_name("parameters") {
        Some(list) => named_children(list)
            .into_iter()
            .map(|param| describe_parameter(tree, param))
            .collect(),
        None => Vec::new(),
    }
}

fn describe_parameter<'a>(tree: &SyntaxTree<'a>, param: Node<'a>) -> Parameter {
    match param.kind() {
        "identifier" => Parameter::Name(tree.text(&param).to_string()),
        // TypeScript: `event: MessageEvent`, `event?: MessageEvent`
        "required_parameter" | "optional_parameter" => {
            if param.child_by_field_name("value").is_some() {
                return Parameter::Pattern("assignment_pattern".to_string());
            }
            match param.child_by_field_name("pattern") {
                Some(pattern) => describe_parameter(tree, pattern),
                None => Parameter::Pattern(param.kind().to_string()),
            }
        }
        other => Parameter::Pattern(other.to_string()),
    }
}

/// 收集全文件的函数声明与函数变量
struct FunctionCollector {
    table: FlatSymbolTable<FunctionShape>,
}

impl<'a> Visitor<'a> for FunctionCollector {
    fn visit(&mut self, tree: &SyntaxTree<'a>, kind: NodeKind, node: Node<'a>) {
        match kind {
            NodeKind::FunctionDeclaration => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.table.record(
                        tree.text(&name),
                        FunctionShape {
                            parameters: parameters_of(tree, node),
                        },
                    );
                }
            }
            NodeKind::VariableDeclarator => {
                let name = node.child_by_field_name("name");
                let value = node.child_by_field_name("value");
                let (Some(name), Some(value)) = (name, value) else {
                    return;
                };
                let value = unwrap_parens(value);
                let is_function = is_function_literal(&value) || is_arrow_function(&value);
                if name.kind() == "identifier" && is_function {
                    self.table.record(
                        tree.text(&name),
                        FunctionShape {
                            parameters: parameters_of(tree, value),
                        },
                    );
                }
            }
            NodeKind::AssignmentExpression | NodeKind::CallExpression => {}
        }
    }
}
