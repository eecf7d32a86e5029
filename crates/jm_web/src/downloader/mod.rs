mod command;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

pub use self::command::CommandDownloader;
use crate::error::DownloadError;
use crate::utils::filenamify::filenamify;

/// 规范化后的相册号，保证带有来源前缀（如 `JM123456`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumId(String);

impl AlbumId {
    /// 前缀比较区分大小写，`jm123` 会被当作没有前缀
    pub fn normalize(raw: &str, prefix: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with(prefix) {
            Self(raw.to_string())
        } else {
            Self(format!("{prefix}{raw}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub album_id: AlbumId,
    /// 交给下载程序的 YAML 配置文件
    pub option_file: PathBuf,
    pub max_chapters: Option<u32>,
}

/// 下载完成后外部程序报告的相册信息
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Album {
    pub id: String,
    pub title: String,
}

impl Album {
    /// 与下载程序按相册标题命名 PDF 的规则保持一致
    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", filenamify(&self.title))
    }
}

/// 下载相册并生成 PDF 的外部例程
#[async_trait]
pub trait AlbumDownloader: Send + Sync {
    async fn download(&self, request: &DownloadRequest) -> Result<Album, DownloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_album_id() {
        assert_eq!(AlbumId::normalize("123456", "JM").as_str(), "JM123456");
        assert_eq!(AlbumId::normalize("JM123456", "JM").as_str(), "JM123456");
        assert_eq!(AlbumId::normalize(" 42 ", "JM").as_str(), "JM42");
        assert_eq!(AlbumId::normalize("jm42", "JM").as_str(), "JMjm42");
    }

    #[test]
    fn test_pdf_file_name() {
        let album = Album {
            id: "JM1".to_string(),
            title: "作者/标题".to_string(),
        };
        assert_eq!(album.pdf_file_name(), "作者_标题.pdf");
    }
}
