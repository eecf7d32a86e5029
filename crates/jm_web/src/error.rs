use std::io;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use uuid::Uuid;

/// 下载任务内部的错误，只记录在任务状态上，不会返回给 HTTP 调用方
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("无法读取下载配置文件 {}: {source}", path.display())]
    OptionFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("无法启动下载程序 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("下载程序异常退出 ({status}): {stderr}")]
    Upstream { status: String, stderr: String },
    #[error("JM下载失败: {0}")]
    NoAlbum(String),
    #[error("下载超时（{}）", format_timeout(.0))]
    Timeout(Duration),
    #[error("任务已取消")]
    Cancelled,
}

impl DownloadError {
    /// 用于日志与 API 的简短分类
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OptionFile { .. } => "option_file",
            Self::Spawn { .. } => "spawn",
            Self::Upstream { .. } => "upstream",
            Self::NoAlbum(_) => "no_album",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

/// 整秒显示为秒，否则显示为毫秒
fn format_timeout(timeout: &Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{} 秒", timeout.as_secs())
    } else {
        format!("{} 毫秒", timeout.as_millis())
    }
}

/// 面向 HTTP 层的错误
#[derive(Error, Debug)]
pub enum AppError {
    #[error("请提供JM漫画ID")]
    MissingAlbumId,
    #[error("最大章节数无效: {0}")]
    InvalidMaxChapters(String),
    #[error("未找到相似的PDF文件: {0}")]
    PdfNotFound(String),
    #[error("PDF目录不存在: {}", .0.display())]
    PdfDirMissing(PathBuf),
    #[error("获取文件列表失败: {0}")]
    Listing(#[source] io::Error),
    #[error("任务不存在: {0}")]
    TaskNotFound(Uuid),
    #[error("任务 ID 无效: {0}")]
    InvalidTaskId(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingAlbumId | Self::InvalidMaxChapters(_) | Self::InvalidTaskId(_) => StatusCode::BAD_REQUEST,
            Self::PdfNotFound(_) | Self::PdfDirMissing(_) | Self::TaskNotFound(_) => StatusCode::NOT_FOUND,
            Self::Listing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回给用户的文本，不暴露服务器上的路径
    pub fn user_message(&self) -> String {
        match self {
            Self::PdfNotFound(_) => "PDF文件不存在或无法访问".to_string(),
            Self::PdfDirMissing(_) => "PDF目录不存在".to_string(),
            _ => self.to_string(),
        }
    }
}

/// HTML 路由直接以纯文本返回错误
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), self.user_message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(AppError::MissingAlbumId.to_string(), "请提供JM漫画ID");
        assert_eq!(DownloadError::NoAlbum("JM1".to_string()).to_string(), "JM下载失败: JM1");
        let err = AppError::Listing(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.to_string(), "获取文件列表失败: denied");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(DownloadError::Timeout(Duration::from_secs(30)).kind(), "timeout");
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(DownloadError::Timeout(Duration::from_secs(30)).to_string(), "下载超时（30 秒）");
        assert_eq!(DownloadError::Timeout(Duration::from_millis(20)).to_string(), "下载超时（20 毫秒）");
        assert_eq!(DownloadError::Timeout(Duration::from_millis(1500)).to_string(), "下载超时（1500 毫秒）");
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = AppError::PdfDirMissing(PathBuf::from("/srv/books/pdf"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.user_message(), "PDF目录不存在");
        let err = AppError::PdfNotFound("a.pdf".to_string());
        assert_eq!(err.user_message(), "PDF文件不存在或无法访问");
        assert_eq!(AppError::MissingAlbumId.status_code(), StatusCode::BAD_REQUEST);
    }
}
