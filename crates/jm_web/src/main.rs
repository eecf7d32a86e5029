#[macro_use]
extern crate tracing;

mod api;
mod config;
mod downloader;
mod error;
mod pdf;
mod task;
mod utils;

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::page::PageRenderer;
use crate::config::{Config, ARGS, CONFIG_DIR};
use crate::downloader::CommandDownloader;
use crate::pdf::PdfLibrary;
use crate::task::{http_server, router, AppState, DownloadWorker, TaskStore, WorkerSettings};
use crate::utils::init_logger;
use crate::utils::signal::terminate;

#[tokio::main]
async fn main() -> Result<()> {
    let config = init()?;

    let token = CancellationToken::new();
    let tracker = TaskTracker::new();

    let downloader = CommandDownloader::new(&config.downloader).context("初始化下载程序失败")?;
    let worker = Arc::new(DownloadWorker::new(
        Arc::new(TaskStore::new()),
        Arc::new(downloader),
        WorkerSettings::from(&config),
        token.child_token(),
    ));
    let state = AppState {
        worker: worker.clone(),
        library: Arc::new(PdfLibrary::new(config.pdf_dir.clone(), config.fuzzy_threshold)),
        pages: Arc::new(PageRenderer::new()?),
    };

    spawn_task(
        "HTTP 服务",
        http_server(config.bind_address.clone(), router(state)),
        &tracker,
        token.clone(),
    );
    tracker.close();
    handle_shutdown(tracker, token).await;
    worker.shutdown().await;
    Ok(())
}

fn spawn_task(
    task_name: &'static str,
    task: impl Future<Output = impl Debug> + Send + 'static,
    tracker: &TaskTracker,
    token: CancellationToken,
) {
    tracker.spawn(async move {
        tokio::select! {
            res = task => {
                error!("「{}」异常结束，返回结果为：「{:?}」，取消其它仍在执行的任务..", task_name, res);
                token.cancel();
            },
            _ = token.cancelled() => {
                info!("「{}」接收到取消信号，终止运行..", task_name);
            }
        }
    });
}

/// 初始化日志系统，打印欢迎信息，加载配置文件
fn init() -> Result<Config> {
    init_logger(&ARGS.log_level);
    info!("欢迎使用 jm-web，当前程序版本：{}", config::version());
    debug!("日志级别: {}", ARGS.log_level);

    let config_path = ARGS.config.clone().unwrap_or_else(|| CONFIG_DIR.join("config.toml"));
    debug!("开始加载配置文件 {}", config_path.display());
    let mut config = Config::load(&config_path)?;
    if let Some(bind_address) = &ARGS.bind_address {
        config.bind_address = bind_address.clone();
    }
    if !config.check() {
        bail!("配置文件 {} 检查未通过", config_path.display());
    }
    info!("PDF 目录: {}", config.pdf_dir.display());
    Ok(config)
}

async fn handle_shutdown(tracker: TaskTracker, token: CancellationToken) {
    tokio::select! {
        _ = tracker.wait() => {
            error!("所有任务均已终止，程序退出")
        }
        _ = terminate() => {
            info!("接收到终止信号，正在终止任务..");
            token.cancel();
            tracker.wait().await;
            info!("所有任务均已终止，程序退出");
        }
    }
}
