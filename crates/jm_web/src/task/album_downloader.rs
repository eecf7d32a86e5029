use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::config::Config;
use crate::downloader::{Album, AlbumDownloader, AlbumId, DownloadRequest};
use crate::error::{AppError, DownloadError};
use crate::task::store::{Task, TaskStore, TaskUpdate};

/// 与浏览器 encodeURIComponent 的保留集合一致
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub const MAX_CHAPTERS_LIMIT: u32 = 1000;

pub fn pdf_url(file_name: &str) -> String {
    format!("/pdf/{}", utf8_percent_encode(file_name, PATH_SEGMENT))
}

/// 下载配置必须是可以打开的普通文件
async fn ensure_readable(path: &Path) -> io::Result<()> {
    let file = tokio::fs::File::open(path).await?;
    if !file.metadata().await?.is_file() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "不是普通文件"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub option_file: PathBuf,
    pub album_prefix: String,
    pub concurrent_downloads: usize,
    pub timeout: Option<Duration>,
}

impl From<&Config> for WorkerSettings {
    fn from(config: &Config) -> Self {
        Self {
            option_file: config.option_file.clone(),
            album_prefix: config.album_prefix.clone(),
            concurrent_downloads: config.concurrent_downloads,
            timeout: config.download_timeout(),
        }
    }
}

/// 后台执行下载任务。
///
/// 提交时同步写入任务表后立即返回，实际下载在 tokio 任务中进行，
/// 并发数受信号量限制，取消令牌触发后排队与执行中的任务都会记为失败。
pub struct DownloadWorker {
    store: Arc<TaskStore>,
    downloader: Arc<dyn AlbumDownloader>,
    settings: Arc<WorkerSettings>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    token: CancellationToken,
}

impl DownloadWorker {
    pub fn new(
        store: Arc<TaskStore>,
        downloader: Arc<dyn AlbumDownloader>,
        settings: WorkerSettings,
        token: CancellationToken,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.concurrent_downloads.max(1)));
        Self {
            store,
            downloader,
            settings: Arc::new(settings),
            permits,
            tracker: TaskTracker::new(),
            token,
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// 校验输入并创建任务，返回时任务已经在任务表中可见
    pub fn submit(&self, album_id: &str, max_chapters: Option<u32>) -> Result<Task, AppError> {
        let album_id = album_id.trim();
        if album_id.is_empty() {
            return Err(AppError::MissingAlbumId);
        }
        if let Some(max) = max_chapters {
            if max == 0 || max > MAX_CHAPTERS_LIMIT {
                return Err(AppError::InvalidMaxChapters(max.to_string()));
            }
        }

        let task = self.store.create(album_id);
        info!("创建下载任务 {}，相册号: {}", task.id, album_id);

        let job = DownloadJob {
            id: task.id,
            raw_album_id: album_id.to_string(),
            max_chapters,
            store: self.store.clone(),
            downloader: self.downloader.clone(),
            settings: self.settings.clone(),
        };
        let permits = self.permits.clone();
        let token = self.token.clone();
        self.tracker.spawn(job.run(permits, token));
        Ok(task)
    }

    /// 正在执行的下载数量
    pub fn running(&self) -> usize {
        self.settings.concurrent_downloads.max(1) - self.permits.available_permits()
    }

    /// 取消所有任务并等待它们写入终止状态
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("所有下载任务均已结束");
    }
}

struct DownloadJob {
    id: Uuid,
    raw_album_id: String,
    max_chapters: Option<u32>,
    store: Arc<TaskStore>,
    downloader: Arc<dyn AlbumDownloader>,
    settings: Arc<WorkerSettings>,
}

impl DownloadJob {
    async fn run(self, permits: Arc<Semaphore>, token: CancellationToken) {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(DownloadError::Cancelled),
            res = self.execute(permits) => res,
        };

        let update = match result {
            Ok(album) => {
                let pdf_name = album.pdf_file_name();
                info!("任务 {} 下载完成，PDF: {}", self.id, pdf_name);
                TaskUpdate::Completed {
                    message: "下载完成".to_string(),
                    pdf_url: pdf_url(&pdf_name),
                    pdf_name,
                }
            }
            Err(e) => {
                error!("下载任务 {} 出错（{}）: {}", self.id, e.kind(), e);
                TaskUpdate::Failed(format!("下载失败: {}", e))
            }
        };
        if let Err(e) = self.store.update(&self.id, update) {
            error!("更新任务状态失败: {}", e);
        }
    }

    async fn execute(&self, permits: Arc<Semaphore>) -> Result<Album, DownloadError> {
        let _permit = permits.acquire_owned().await.map_err(|_| DownloadError::Cancelled)?;
        self.progress("正在下载中，请耐心等待...".to_string());

        // 每个任务开始时重新确认配置文件，修改后对之后的任务生效
        ensure_readable(&self.settings.option_file)
            .await
            .map_err(|source| DownloadError::OptionFile {
                path: self.settings.option_file.clone(),
                source,
            })?;

        let album_id = AlbumId::normalize(&self.raw_album_id, &self.settings.album_prefix);
        self.progress(format!("正在下载 {}...", album_id));

        let request = DownloadRequest {
            album_id,
            option_file: self.settings.option_file.clone(),
            max_chapters: self.max_chapters,
        };
        let download = self.downloader.download(&request);
        match self.settings.timeout {
            Some(timeout) => tokio::time::timeout(timeout, download)
                .await
                .map_err(|_| DownloadError::Timeout(timeout))?,
            None => download.await,
        }
    }

    fn progress(&self, message: String) {
        if let Err(e) = self.store.update(&self.id, TaskUpdate::Progress(message)) {
            warn!("更新任务进度失败: {}", e);
        }
    }
}
