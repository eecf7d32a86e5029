pub mod album_downloader;
mod http_server;
mod store;

pub use album_downloader::{DownloadWorker, WorkerSettings};
pub use http_server::{http_server, router, AppState};
pub use store::{Task, TaskStatus, TaskStore};
