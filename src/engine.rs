//! Scan Engine - 目录/单文件扫描编排
//!
//! 1. 文件发现 (walkdir)
//! 2. 并行处理每个文件 (rayon)，每个文件独立解析、独立的别名表
//! 3. 汇总为 ScanOutcome，供 CLI 输出与报告持久化
//!
//! 读文件失败、解析失败只影响当前文件 (warn + 空结果)；
//! 路径不存在、模式不匹配属于调用错误，直接返回 Err。

use anyhow::{bail, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::discovery::{self, SourceFile};
use crate::scanner::markup::ScriptCounts;
use crate::scanner::{self, FileKind, FileUnit, SecurityReport};

/// 扫描模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    SingleFile,
    Directory,
}

/// 单文件结果
#[derive(Debug, Clone)]
pub struct FileResult {
    pub path: PathBuf,
    pub kind: FileKind,
    pub report: SecurityReport,
    /// HTML 文件的脚本统计
    pub scripts: Option<ScriptCounts>,
    /// 读取或解析失败的原因
    pub error: Option<String>,
}

impl FileResult {
    pub fn listener_count(&self) -> usize {
        self.report.message_listeners.len()
    }

    pub fn vulnerability_count(&self) -> usize {
        self.report.vulnerabilities.len()
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub root: PathBuf,
    pub files: Vec<FileResult>,
}

impl ScanOutcome {
    pub fn total_listeners(&self) -> usize {
        self.files.iter().map(FileResult::listener_count).sum()
    }

    pub fn total_vulnerabilities(&self) -> usize {
        self.files.iter().map(FileResult::vulnerability_count).sum()
    }
}

/// 校验路径与模式，然后扫描
pub fn scan(path: &Path, mode: ScanMode, config: &ScanConfig) -> Result<ScanOutcome> {
    if !path.exists() {
        bail!("path '{}' does not exist", path.display());
    }

    let files = match mode {
        ScanMode::SingleFile => {
            if !path.is_file() {
                bail!("'{}' is not a file (omit --file to scan a directory)", path.display());
            }
            let Some(kind) = FileKind::from_path(path) else {
                bail!(
                    "'{}' is not a supported file type (.html, .js, .ts, .jsx, .tsx)",
                    path.display()
                );
            };
            vec![SourceFile {
                path: path.to_path_buf(),
                kind,
            }]
        }
        ScanMode::Directory => {
            if !path.is_dir() {
                bail!("'{}' is not a directory (use --file to scan a single file)", path.display());
            }
            discovery::discover_files(path, config)
        }
    };

    info!(files = files.len(), root = %path.display(), "scanning");

    let results: Vec<FileResult> = if config.parallel {
        files.par_iter().map(process_file).collect()
    } else {
        files.iter().map(process_file).collect()
    };

    Ok(ScanOutcome {
        root: path.to_path_buf(),
        files: results,
    })
}

/// 读取并分析单个文件，失败时返回带错误信息的空结果
pub fn process_file(file: &SourceFile) -> FileResult {
    let shown = file.path.display().to_string();

    let bytes = match std::fs::read(&file.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %shown, "unable to read file: {e}");
            return FileResult {
                path: file.path.clone(),
                kind: file.kind,
                report: SecurityReport::empty(shown),
                scripts: None,
                error: Some(e.to_string()),
            };
        }
    };
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let unit = FileUnit::new(&file.path, file.kind, text);
    let error = unit.parse_error.as_ref().map(|e| {
        warn!(path = %shown, "unable to parse file: {e}");
        e.to_string()
    });

    let report = scanner::analyze(&unit);
    debug!(
        path = %shown,
        listeners = report.message_listeners.len(),
        vulnerabilities = report.vulnerabilities.len(),
        "file analyzed"
    );

    FileResult {
        path: file.path.clone(),
        kind: file.kind,
        report,
        scripts: unit.markup.as_ref().map(|m| m.counts),
        error,
    }
}
