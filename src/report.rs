//! 报告输出: 控制台摘要 + JSON 报告文件

use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::engine::{FileResult, ScanOutcome};
use crate::scanner::markup::ScriptCounts;
use crate::scanner::{HandlerKind, Parameter, SourceKind, TargetTag, Vulnerability};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanArtifact {
    pub timestamp: String,
    pub root: String,
    pub summary: Summary,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_files: usize,
    pub total_listeners: usize,
    pub total_vulnerabilities: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub kind: &'static str,
    pub listeners: Vec<ListenerEntry>,
    pub vulnerabilities: Vec<Vulnerability>,
    /// 仅 HTML 文件
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<ScriptCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerEntry {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub line: usize,
    pub target: TargetTag,
    pub handler_kind: HandlerKind,
    pub parameters: Vec<Parameter>,
}

impl ScanArtifact {
    pub fn from_outcome(outcome: &ScanOutcome) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            root: outcome.root.display().to_string(),
            summary: Summary {
                total_files: outcome.files.len(),
                total_listeners: outcome.total_listeners(),
                total_vulnerabilities: outcome.total_vulnerabilities(),
            },
            files: outcome.files.iter().map(FileEntry::from_result).collect(),
        }
    }
}

impl FileEntry {
    fn from_result(result: &FileResult) -> Self {
        Self {
            path: result.path.display().to_string(),
            kind: result.kind.as_str(),
            listeners: result
                .report
                .message_listeners
                .iter()
                .map(|h| ListenerEntry {
                    kind: h.kind,
                    line: h.line,
                    target: h.target,
                    handler_kind: h.handler_kind,
                    parameters: h.parameters.clone(),
                })
                .collect(),
            vulnerabilities: result.report.vulnerabilities.clone(),
            scripts: result.scripts,
            error: result.error.clone(),
        }
    }
}

/// 写入报告文件。失败只记录警告，不影响退出码。
pub fn write_artifact(artifact: &ScanArtifact, path: &Path) -> bool {
    let json = match serde_json::to_string_pretty(artifact) {
        Ok(json) => json,
        Err(e) => {
            warn!("unable to serialize report: {e}");
            return false;
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %path.display(), "unable to create report directory: {e}");
            return false;
        }
    }

    match std::fs::write(path, json) {
        Ok(()) => {
            info!(path = %path.display(), "report written");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), "unable to write report: {e}");
            false
        }
    }
}

/// 控制台单行摘要
pub fn file_line(result: &FileResult) -> String {
    let mut line = format!(
        "{:<10} {}  vulnerabilities: {}  listeners: {}",
        result.kind.as_str(),
        result.path.display(),
        result.vulnerability_count(),
        result.listener_count()
    );
    if result.error.is_some() {
        line.push_str("  (skipped: unreadable or unparsable)");
    }
    line
}

pub fn summary_line(outcome: &ScanOutcome) -> String {
    format!(
        "Scanned {} files: {} message listeners, {} vulnerabilities",
        outcome.files.len(),
        outcome.total_listeners(),
        outcome.total_vulnerabilities()
    )
}
