use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::{Config, SwaggerUi};

use crate::api::handler::{
    create_task, download_redirect, get_logs, get_pdfs, get_task, get_tasks, index, list_pdfs, serve_pdf_file,
    submit_download, ApiDoc,
};
use crate::api::page::PageRenderer;
use crate::pdf::PdfLibrary;
use crate::task::DownloadWorker;

/// 所有路由共享的状态
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<DownloadWorker>,
    pub library: Arc<PdfLibrary>,
    pub pages: Arc<PageRenderer>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/download", get(download_redirect).post(submit_download))
        .route("/pdf/{*name}", get(serve_pdf_file))
        .route("/list_pdfs", get(list_pdfs))
        .route("/api/tasks", get(get_tasks).post(create_task))
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/pdfs", get(get_pdfs))
        .route("/api/logs", get(get_logs))
        .merge(
            SwaggerUi::new("/swagger-ui/")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(Config::default().try_it_out_enabled(true).validator_url("none")),
        )
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

pub async fn http_server(bind_address: String, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .context("bind address failed")?;
    info!("开始运行下载页: http://{}", bind_address);
    Ok(axum::serve(listener, app).await?)
}
