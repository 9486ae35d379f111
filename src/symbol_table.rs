// ============================================================================
// 符号表模块 - 文件级扁平符号表
// ============================================================================
//
// 别名追踪和外部 handler 查找共用同一种启发式:
// 整个文件一张表，不区分作用域，不做控制流，按遍历顺序最后一次写入生效。
// 通过 SymbolLookup trait 隔离，后续可替换为带作用域的实现。

use std::collections::HashMap;

/// 名称查找接口
pub trait SymbolLookup<V> {
    fn lookup(&self, name: &str) -> Option<&V>;

    fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// 文件级扁平符号表 (last write wins)
#[derive(Debug, Clone)]
pub struct FlatSymbolTable<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for FlatSymbolTable<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> FlatSymbolTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次绑定，覆盖同名的旧绑定
    pub fn record(&mut self, name: &str, value: V) {
        self.entries.insert(name.to_string(), value);
    }
}

impl<V> SymbolLookup<V> for FlatSymbolTable<V> {
    fn lookup(&self, name: &str) -> Option<&V> {
        self.entries.get(name)
    }
}

/// 局部变量名 -> 是否为全局 window 的别名
pub type AliasTable = FlatSymbolTable<bool>;

impl FlatSymbolTable<bool> {
    pub fn is_alias(&self, name: &str) -> bool {
        matches!(self.lookup(name), Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_last_write_wins() {
        let mut table: FlatSymbolTable<u32> = FlatSymbolTable::new();
        table.record("handler", 1);
        table.record("other", 2);
        table.record("handler", 3);

        assert_eq!(table.lookup("handler"), Some(&3));
        assert_eq!(table.lookup("other"), Some(&2));
    }

    #[test]
    fn test_alias_table_only_reports_positive_entries() {
        let mut aliases = AliasTable::new();
        aliases.record("w", true);
        aliases.record("d", false);

        assert!(aliases.is_alias("w"));
        assert!(!aliases.is_alias("d"));
        assert!(!aliases.is_alias("missing"));
        assert!(aliases.contains("d"));
    }

    proptest! {
        /// 任意写入序列后，每个名字的值等于该名字最后一次写入的值
        #[test]
        fn prop_lookup_returns_last_recorded_value(
            writes in prop::collection::vec(("[a-d]", any::<u8>()), 0..32)
        ) {
            let mut table = FlatSymbolTable::new();
            for (name, value) in &writes {
                table.record(name, *value);
            }

            for (name, _) in &writes {
                let expected = writes.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v);
                prop_assert_eq!(table.lookup(name), expected);
            }
        }
    }
}
