//! 扫描配置
//!
//! 可选的 YAML 配置文件，命令行参数优先级更高。
//!
//! ```yaml
//! exclude_dirs: [vendor, generated]
//! follow_links: false
//! parallel: true
//! report_path: reports/message-audit.json
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 默认报告输出位置 (当前工作目录)
pub const DEFAULT_REPORT_PATH: &str = "message-audit-report.json";

/// 构建产物 / VCS / 依赖 / 日志目录，始终跳过
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".vscode",
    ".idea",
    "dist",
    "build",
    "coverage",
    ".nyc_output",
    "logs",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 额外跳过的目录名
    pub exclude_dirs: Vec<String>,
    pub follow_links: bool,
    pub parallel: bool,
    pub report_path: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: Vec::new(),
            follow_links: false,
            parallel: true,
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// 目录名是否应被跳过 (以 `.` 开头的目录一律跳过)
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        name.starts_with('.')
            || DEFAULT_EXCLUDED_DIRS.contains(&name)
            || self.exclude_dirs.iter().any(|d| d == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_exclusions() {
        let config = ScanConfig::default();
        for name in ["node_modules", "dist", "build", "coverage", "logs", ".cache", ".git"] {
            assert!(config.is_excluded_dir(name), "{name} should be excluded");
        }
        assert!(!config.is_excluded_dir("src"));
        assert!(!config.is_excluded_dir("vendor"));
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "exclude_dirs: [vendor]\nparallel: false").unwrap();

        let config = ScanConfig::load(file.path()).unwrap();
        assert!(config.is_excluded_dir("vendor"));
        assert!(!config.parallel);
        assert!(!config.follow_links);
        assert_eq!(config.report_path, PathBuf::from(DEFAULT_REPORT_PATH));
    }

    #[test]
    fn test_load_rejects_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "parallel: [not, a, bool]").unwrap();
        assert!(ScanConfig::load(file.path()).is_err());
    }
}
