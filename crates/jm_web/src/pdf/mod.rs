pub mod fuzzy;

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tokio::fs;

use crate::error::AppError;
use crate::pdf::fuzzy::{normalize_filename, ratio};

/// 解析请求文件名的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Exact(PathBuf),
    Fuzzy { path: PathBuf, score: u8 },
}

impl Resolution {
    pub fn path(&self) -> &Path {
        match self {
            Self::Exact(path) | Self::Fuzzy { path, .. } => path,
        }
    }
}

/// 扫描目录时临时生成的文件记录
#[derive(Debug, Clone)]
pub struct PdfFile {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

impl PdfFile {
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size as f64 / 1024.0 / 1024.0)
    }

    pub fn modified_label(&self) -> String {
        DateTime::<Local>::from(self.modified)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// 下载程序输出 PDF 的目录，Web 端只读
pub struct PdfLibrary {
    dir: PathBuf,
    threshold: u8,
}

impl PdfLibrary {
    pub fn new(dir: PathBuf, threshold: u8) -> Self {
        Self { dir, threshold }
    }

    /// 先尝试完全匹配，再按标准化后的文件名做模糊匹配
    pub async fn resolve(&self, requested: &str) -> Result<Resolution, AppError> {
        if is_plain_file_name(requested) {
            let exact = self.dir.join(requested);
            if fs::metadata(&exact).await.is_ok_and(|meta| meta.is_file()) {
                debug!("找到完全匹配的文件: {}", requested);
                return Ok(Resolution::Exact(exact));
            }
        }

        let target = normalize_filename(requested);
        let mut candidates = self
            .scan()
            .await
            .map_err(|e| {
                warn!("扫描目录 {} 失败: {:#}", self.dir.display(), e);
                AppError::PdfNotFound(requested.to_string())
            })?
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        // 目录遍历顺序不固定，排序后同分时结果稳定
        candidates.sort();

        let mut best: Option<(String, u8)> = None;
        for name in candidates {
            let score = ratio(&target, &normalize_filename(&name));
            trace!("候选文件: {}，相似度: {}", name, score);
            // 零分的候选不算匹配，同分时保留排序靠前的
            if score > best.as_ref().map_or(0, |(_, best_score)| *best_score) {
                best = Some((name, score));
            }
        }

        match best {
            Some((name, score)) if score >= self.threshold => {
                info!("请求 {} 模糊匹配到 {}，相似度: {}", requested, name, score);
                Ok(Resolution::Fuzzy {
                    path: self.dir.join(name),
                    score,
                })
            }
            _ => Err(AppError::PdfNotFound(requested.to_string())),
        }
    }

    /// 按修改时间降序列出所有 PDF
    pub async fn list(&self) -> Result<Vec<PdfFile>, AppError> {
        debug!("正在扫描目录: {}", self.dir.display());
        let entries = self.scan().await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                AppError::PdfDirMissing(self.dir.clone())
            } else {
                AppError::Listing(e)
            }
        })?;

        let mut files = Vec::with_capacity(entries.len());
        for (name, path) in entries {
            match fs::metadata(&path).await.and_then(|meta| Ok((meta.len(), meta.modified()?))) {
                Ok((size, modified)) => files.push(PdfFile { name, size, modified }),
                Err(e) => warn!("处理文件 {} 时出错: {}", name, e),
            }
        }
        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        debug!("找到 {} 个PDF文件", files.len());
        Ok(files)
    }

    /// 目录下所有扩展名为 pdf 的普通文件
    async fn scan(&self) -> io::Result<Vec<(String, PathBuf)>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut pdfs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"));
            if !is_pdf || !entry.file_type().await.is_ok_and(|t| t.is_file()) {
                continue;
            }
            // 无法以 UTF-8 表示的文件名无法出现在链接里，直接跳过
            if let Some(name) = entry.file_name().to_str() {
                pdfs.push((name.to_string(), path));
            }
        }
        Ok(pdfs)
    }
}

/// 只允许单个普通路径分量，防止通过 `..` 或绝对路径跳出目录
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
