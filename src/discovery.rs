//! 文件发现: 递归遍历目录，按扩展名筛选 Web 应用文件

use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::scanner::FileKind;

/// 待扫描文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// 递归收集目录下所有受支持的文件，按路径排序
///
/// 不可读的目录只记录警告并跳过，兄弟目录继续遍历。
pub fn discover_files(root: &Path, config: &ScanConfig) -> Vec<SourceFile> {
    let walker = WalkDir::new(root)
        .follow_links(config.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            // 根目录本身永不跳过
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !config.is_excluded_dir(&entry.file_name().to_string_lossy())
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let location = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                warn!(path = %location, "unable to scan directory entry: {e}");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = FileKind::from_path(entry.path()) {
            files.push(SourceFile {
                path: entry.into_path(),
                kind,
            });
        }
    }

    files
}
