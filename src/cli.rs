//! CLI 模式处理器
//!
//! 默认逐文件输出人类可读的摘要，并把完整报告写入 JSON 文件；
//! 使用 --json 参数将完整报告输出到 stdout。

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::config::ScanConfig;
use crate::engine::{self, ScanMode};
use crate::report::{self, ScanArtifact};

/// Web Message Audit
///
/// 检测未校验来源的 message 事件处理器与 eval 调用
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 要扫描的目录 (或配合 --file 的单个文件)
    pub path: PathBuf,

    /// 单文件模式
    #[arg(long)]
    pub file: bool,

    /// 报告输出路径 (默认 message-audit-report.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// YAML 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输出 JSON 格式 (默认输出逐文件摘要)
    #[arg(long)]
    pub json: bool,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// 合并配置文件与命令行参数 (命令行优先)
    pub fn scan_config(&self) -> Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::load(path)?,
            None => ScanConfig::default(),
        };
        if let Some(output) = &self.output {
            config.report_path = output.clone();
        }
        Ok(config)
    }

    pub fn mode(&self) -> ScanMode {
        if self.file {
            ScanMode::SingleFile
        } else {
            ScanMode::Directory
        }
    }
}

/// 处理 CLI 命令
pub fn run(cli: &Cli) -> Result<()> {
    let config = cli.scan_config()?;
    let outcome = engine::scan(&cli.path, cli.mode(), &config)?;
    let artifact = ScanArtifact::from_outcome(&outcome);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
    } else {
        if outcome.files.is_empty() {
            println!("No web application files found (.html, .js, .ts, .jsx, .tsx)");
        }
        for result in &outcome.files {
            println!("{}", report::file_line(result));
        }
        println!();
        println!("{}", report::summary_line(&outcome));
    }

    // 写入失败只告警，不改变退出状态
    if report::write_artifact(&artifact, &config.report_path) && !cli.json {
        println!("Report saved to {}", config.report_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_required() {
        assert!(Cli::try_parse_from(["message-audit"]).is_err());
    }

    #[test]
    fn test_defaults_to_directory_mode() {
        let cli = Cli::try_parse_from(["message-audit", "./webapp"]).unwrap();
        assert_eq!(cli.mode(), ScanMode::Directory);
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json);
    }

    #[test]
    fn test_file_flag_and_output_override() {
        let cli =
            Cli::try_parse_from(["message-audit", "app.js", "--file", "-o", "out/r.json"]).unwrap();
        assert_eq!(cli.mode(), ScanMode::SingleFile);

        let config = cli.scan_config().unwrap();
        assert_eq!(config.report_path, PathBuf::from("out/r.json"));
    }

    #[test]
    fn test_run_writes_report_to_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("site");
        std::fs::create_dir_all(&project).unwrap();
        let code = "window.onmessage = (e) => eval(e.data);\n";
        std::fs::write(project.join("main.js"), code).unwrap();
        let output = dir.path().join("report.json");

        let cli = Cli::try_parse_from([
            "message-audit".into(),
            project.into_os_string(),
            "--output".into(),
            output.clone().into_os_string(),
        ])
        .unwrap();
        run(&cli).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["summary"]["totalListeners"], 1);
        assert_eq!(written["summary"]["totalVulnerabilities"], 1);
    }
}
