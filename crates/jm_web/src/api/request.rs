use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;

/// 首页表单，字段缺失与空字符串同样处理
#[derive(Deserialize, Default)]
pub struct DownloadForm {
    pub jm_id: Option<String>,
    pub max_chapters: Option<String>,
}

impl DownloadForm {
    pub fn album_id(&self) -> &str {
        self.jm_id.as_deref().unwrap_or_default()
    }

    pub fn max_chapters(&self) -> Result<Option<u32>, AppError> {
        match self.max_chapters.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<u32>()
                .map(Some)
                .map_err(|_| AppError::InvalidMaxChapters(raw.to_string())),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitTaskRequest {
    /// 相册号，可以带或不带 JM 前缀
    pub album_id: String,
    pub max_chapters: Option<u32>,
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct TaskQuery {
    /// 为 true 时等待任务结束再返回，最多等待 30 秒
    pub wait: Option<bool>,
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct LogsRequest {
    /// 返回的条数，默认 100
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn form(jm_id: Option<&str>, max_chapters: Option<&str>) -> DownloadForm {
        DownloadForm {
            jm_id: jm_id.map(str::to_string),
            max_chapters: max_chapters.map(str::to_string),
        }
    }

    #[test]
    fn test_max_chapters_parsing() {
        assert_eq!(form(Some("1"), None).max_chapters().unwrap(), None);
        assert_eq!(form(Some("1"), Some("  ")).max_chapters().unwrap(), None);
        assert_eq!(form(Some("1"), Some(" 12 ")).max_chapters().unwrap(), Some(12));
        assert_matches!(
            form(Some("1"), Some("abc")).max_chapters(),
            Err(AppError::InvalidMaxChapters(raw)) if raw == "abc"
        );
        assert_matches!(form(Some("1"), Some("-3")).max_chapters(), Err(AppError::InvalidMaxChapters(_)));
    }

    #[test]
    fn test_missing_album_id() {
        assert_eq!(form(None, None).album_id(), "");
        assert_eq!(form(Some("123"), None).album_id(), "123");
    }
}
