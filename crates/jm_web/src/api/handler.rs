use std::time::Duration;

use axum::extract::rejection::{FormRejection, PathRejection};
use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::Serialize;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::api::page::PageRenderer;
use crate::api::pdf_stream::serve_pdf;
use crate::api::request::{DownloadForm, LogsRequest, SubmitTaskRequest, TaskQuery};
use crate::api::response::{IndexPage, PdfFileResponse, PdfFileView, PdfListFragment, PdfListResponse, TaskView};
use crate::api::wrapper::{ApiError, ApiResponse};
use crate::config::version;
use crate::error::AppError;
use crate::task::{AppState, Task, TaskStatus};
use crate::utils::{recent_logs, LogEntry};

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 2000;
const TASK_WAIT_LIMIT: Duration = Duration::from_secs(30);

#[derive(OpenApi)]
#[openapi(paths(get_tasks, create_task, get_task, get_pdfs, get_logs))]
pub struct ApiDoc;

fn render_html<T: Serialize>(pages: &PageRenderer, name: &str, data: &T) -> Response {
    match pages.render(name, data) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("渲染模板 {} 失败: {}", name, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "页面渲染失败").into_response()
        }
    }
}

/// 首页：下载表单与任务列表
pub async fn index(Extension(state): Extension<AppState>) -> Response {
    let tasks = state.worker.store().list();
    let auto_refresh = tasks.iter().any(|task| task.status == TaskStatus::InProgress);
    let page = IndexPage {
        total: tasks.len(),
        tasks: tasks.into_iter().map(TaskView::from).collect(),
        running: state.worker.running(),
        auto_refresh,
        version: version().into_owned(),
    };
    render_html(&state.pages, "index", &page)
}

/// 表单提交，任务创建后立即跳回首页。无法解析的请求体视同未填写
pub async fn submit_download(
    Extension(state): Extension<AppState>,
    form: Result<Form<DownloadForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let form = match form {
        Ok(Form(form)) => form,
        Err(e) => {
            debug!("无法解析下载表单: {}", e.body_text());
            DownloadForm::default()
        }
    };
    if form.album_id().trim().is_empty() {
        return Err(AppError::MissingAlbumId);
    }
    let max_chapters = form.max_chapters()?;
    state.worker.submit(form.album_id(), max_chapters)?;
    Ok(Redirect::to("/"))
}

pub async fn download_redirect() -> Redirect {
    Redirect::to("/")
}

/// 完全匹配或模糊匹配 PDF 文件名，失败时统一返回 404
pub async fn serve_pdf_file(
    Extension(state): Extension<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let resolution = match state.library.resolve(&name).await {
        Ok(resolution) => resolution,
        Err(e) => {
            warn!("无法提供PDF文件: {}", e);
            return e.into_response();
        }
    };
    match serve_pdf(resolution.path(), &headers).await {
        Ok(response) => response,
        Err(e) => {
            error!("发送PDF文件 {} 失败: {:#}", resolution.path().display(), e);
            AppError::PdfNotFound(name).into_response()
        }
    }
}

/// 首页按钮加载的 HTML 片段
pub async fn list_pdfs(Extension(state): Extension<AppState>) -> Response {
    let files = match state.library.list().await {
        Ok(files) => files,
        Err(e) => {
            error!("获取PDF列表失败: {}", e);
            return e.into_response();
        }
    };
    let fragment = PdfListFragment {
        count: files.len(),
        files: files.iter().map(PdfFileView::from).collect(),
    };
    render_html(&state.pages, "pdf_list", &fragment)
}

/// 列出所有下载任务，按创建顺序排列
#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, body = ApiResponse<Vec<Task>>),
    )
)]
pub async fn get_tasks(Extension(state): Extension<AppState>) -> ApiResponse<Vec<Task>> {
    ApiResponse::ok(state.worker.store().list())
}

/// 提交下载任务
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = SubmitTaskRequest,
    responses(
        (status = 201, body = ApiResponse<Task>),
        (status = 400, body = ApiResponse<String>),
    )
)]
pub async fn create_task(
    Extension(state): Extension<AppState>,
    Json(request): Json<SubmitTaskRequest>,
) -> Result<ApiResponse<Task>, ApiError> {
    let task = state.worker.submit(&request.album_id, request.max_chapters)?;
    Ok(ApiResponse::created(task))
}

/// 查询单个任务
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = Uuid, Path, description = "任务 ID"), TaskQuery),
    responses(
        (status = 200, body = ApiResponse<Task>),
        (status = 400, body = ApiResponse<String>),
        (status = 404, body = ApiResponse<String>),
    )
)]
pub async fn get_task(
    Extension(state): Extension<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    Query(query): Query<TaskQuery>,
) -> Result<ApiResponse<Task>, ApiError> {
    let Path(id) = id.map_err(|e| AppError::InvalidTaskId(e.body_text()))?;
    let store = state.worker.store();
    let task = if query.wait.unwrap_or(false) {
        match tokio::time::timeout(TASK_WAIT_LIMIT, store.wait_terminal(&id)).await {
            Ok(task) => task,
            // 超时后返回当前状态
            Err(_) => store.get(&id),
        }
    } else {
        store.get(&id)
    };
    Ok(ApiResponse::ok(task.ok_or(AppError::TaskNotFound(id))?))
}

/// 列出 PDF 目录中的文件，最近修改的在前
#[utoipa::path(
    get,
    path = "/api/pdfs",
    responses(
        (status = 200, body = ApiResponse<PdfListResponse>),
        (status = 404, body = ApiResponse<String>),
    )
)]
pub async fn get_pdfs(Extension(state): Extension<AppState>) -> Result<ApiResponse<PdfListResponse>, ApiError> {
    let files = state.library.list().await?;
    Ok(ApiResponse::ok(PdfListResponse {
        total: files.len(),
        files: files.into_iter().map(PdfFileResponse::from).collect(),
    }))
}

/// 最近的运行日志
#[utoipa::path(
    get,
    path = "/api/logs",
    params(LogsRequest),
    responses(
        (status = 200, body = ApiResponse<Vec<LogEntry>>),
    )
)]
pub async fn get_logs(Query(params): Query<LogsRequest>) -> ApiResponse<Vec<LogEntry>> {
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
    ApiResponse::ok(recent_logs(limit))
}
