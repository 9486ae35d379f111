// ============================================================================
// Web Message Audit - Library Interface
// ============================================================================
//
// 扫描 Web 应用源码 (HTML / JS / TS / JSX / TSX)，检测:
// - 订阅跨文档 message 事件的代码 (addEventListener / onmessage，含 window 别名)
// - 动态代码执行 sink (eval)
//
// The main binary (main.rs) drives these modules through cli::run.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod report;
pub mod scanner;
pub mod symbol_table;
