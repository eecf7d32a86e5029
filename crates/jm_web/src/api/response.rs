use chrono::{DateTime, Local};
use serde::Serialize;
use utoipa::ToSchema;

use crate::pdf::PdfFile;
use crate::task::album_downloader::pdf_url;
use crate::task::{Task, TaskStatus};

/// 首页任务列表的一行
#[derive(Serialize)]
pub struct TaskView {
    pub album_id: String,
    pub status_class: &'static str,
    pub status_label: &'static str,
    pub message: String,
    pub pdf_url: Option<String>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        let status_class = match task.status {
            TaskStatus::InProgress => "status-in-progress",
            TaskStatus::Completed => "status-completed",
            TaskStatus::Failed => "status-failed",
        };
        Self {
            album_id: task.album_id,
            status_class,
            status_label: task.status.label(),
            message: task.message,
            pdf_url: task.pdf_url,
        }
    }
}

#[derive(Serialize)]
pub struct IndexPage {
    pub tasks: Vec<TaskView>,
    pub total: usize,
    /// 正在占用下载名额的任务数
    pub running: usize,
    /// 有任务在下载时页面定时刷新
    pub auto_refresh: bool,
    pub version: String,
}

#[derive(Serialize)]
pub struct PdfFileView {
    pub name: String,
    pub url: String,
    pub size: String,
    pub modified: String,
}

impl From<&PdfFile> for PdfFileView {
    fn from(file: &PdfFile) -> Self {
        Self {
            url: pdf_url(&file.name),
            size: file.size_label(),
            modified: file.modified_label(),
            name: file.name.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct PdfListFragment {
    pub count: usize,
    pub files: Vec<PdfFileView>,
}

#[derive(Serialize, ToSchema)]
pub struct PdfFileResponse {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl From<PdfFile> for PdfFileResponse {
    fn from(file: PdfFile) -> Self {
        Self {
            url: pdf_url(&file.name),
            size: file.size,
            modified: file.modified.into(),
            name: file.name,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PdfListResponse {
    pub total: usize,
    pub files: Vec<PdfFileResponse>,
}
