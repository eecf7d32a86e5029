use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use dashmap::DashMap;
use serde::Serialize;
use strum::{AsRefStr, Display};
use thiserror::Error;
use tokio::sync::watch;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, Display, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TaskStatus {
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::InProgress => "下载中...",
            Self::Completed => "已完成",
            Self::Failed => "失败",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    #[serde(skip)]
    seq: u64,
    /// 用户提交的原始相册号
    pub album_id: String,
    pub status: TaskStatus,
    pub message: String,
    pub pdf_name: Option<String>,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub enum TaskUpdate {
    Progress(String),
    Completed {
        message: String,
        pdf_name: String,
        pdf_url: String,
    },
    Failed(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum TaskStoreError {
    #[error("任务不存在: {0}")]
    NotFound(Uuid),
    #[error("任务 {id} 已处于终止状态 {status}")]
    AlreadyTerminal { id: Uuid, status: TaskStatus },
}

/// 内存中的任务表。
///
/// 单个任务的更新在分片锁内完成，读取返回快照，不会看到更新到一半的任务。
/// 每次变更都会递增 `changed` 中的版本号，等待方据此被唤醒。
pub struct TaskStore {
    tasks: DashMap<Uuid, Task>,
    next_seq: AtomicU64,
    changed: watch::Sender<u64>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            tasks: DashMap::new(),
            next_seq: AtomicU64::new(0),
            changed,
        }
    }

    pub fn create(&self, album_id: impl Into<String>) -> Task {
        let now = Local::now();
        let task = Task {
            id: Uuid::new_v4(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            album_id: album_id.into(),
            status: TaskStatus::InProgress,
            message: "初始化下载...".to_string(),
            pdf_name: None,
            pdf_url: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(task.id, task.clone());
        self.notify();
        task
    }

    pub fn get(&self, id: &Uuid) -> Option<Task> {
        self.tasks.get(id).map(|task| task.clone())
    }

    /// 按创建顺序返回所有任务
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.iter().map(|entry| entry.value().clone()).collect();
        tasks.sort_by_key(|task| task.seq);
        tasks
    }

    /// 终止状态的任务拒绝任何后续更新
    pub fn update(&self, id: &Uuid, update: TaskUpdate) -> Result<Task, TaskStoreError> {
        let updated = {
            let mut entry = self.tasks.get_mut(id).ok_or(TaskStoreError::NotFound(*id))?;
            let task = entry.value_mut();
            if task.status.is_terminal() {
                return Err(TaskStoreError::AlreadyTerminal {
                    id: *id,
                    status: task.status,
                });
            }
            match update {
                TaskUpdate::Progress(message) => task.message = message,
                TaskUpdate::Completed {
                    message,
                    pdf_name,
                    pdf_url,
                } => {
                    task.status = TaskStatus::Completed;
                    task.message = message;
                    task.pdf_name = Some(pdf_name);
                    task.pdf_url = Some(pdf_url);
                }
                TaskUpdate::Failed(message) => {
                    task.status = TaskStatus::Failed;
                    task.message = message;
                }
            }
            task.updated_at = Local::now();
            task.clone()
        };
        self.notify();
        Ok(updated)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// 等待任务进入终止状态，任务不存在时返回 None
    pub async fn wait_terminal(&self, id: &Uuid) -> Option<Task> {
        let mut rx = self.subscribe();
        loop {
            let task = self.get(id)?;
            if task.status.is_terminal() {
                return Some(task);
            }
            if rx.changed().await.is_err() {
                return self.get(id);
            }
        }
    }

    fn notify(&self) {
        self.changed.send_modify(|version| *version = version.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_create_and_list_in_order() {
        let store = TaskStore::new();
        let first = store.create("1");
        let second = store.create("2");
        let third = store.create("1");

        assert_eq!(store.list().len(), 3);
        let ids: Vec<_> = store.list().into_iter().map(|task| task.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
        assert_eq!(first.status, TaskStatus::InProgress);
        assert_eq!(first.message, "初始化下载...");
        assert_ne!(first.id, third.id);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let store = TaskStore::new();
        let task = store.create("123");

        store.update(&task.id, TaskUpdate::Progress("正在下载".to_string())).unwrap();
        let done = store
            .update(
                &task.id,
                TaskUpdate::Completed {
                    message: "下载完成".to_string(),
                    pdf_name: "a.pdf".to_string(),
                    pdf_url: "/pdf/a.pdf".to_string(),
                },
            )
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        assert_matches!(
            store.update(&task.id, TaskUpdate::Failed("boom".to_string())),
            Err(TaskStoreError::AlreadyTerminal {
                status: TaskStatus::Completed,
                ..
            })
        );
        assert_matches!(
            store.update(&task.id, TaskUpdate::Progress("again".to_string())),
            Err(TaskStoreError::AlreadyTerminal { .. })
        );
        let task = store.get(&task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.pdf_url.as_deref(), Some("/pdf/a.pdf"));
    }

    #[test]
    fn test_update_unknown_task() {
        let store = TaskStore::new();
        let id = Uuid::new_v4();
        assert_eq!(
            store.update(&id, TaskUpdate::Failed("x".to_string())).unwrap_err(),
            TaskStoreError::NotFound(id)
        );
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in-progress");
        assert_eq!(TaskStatus::Failed.as_ref(), "failed");
        assert_eq!(serde_json::to_value(TaskStatus::Completed).unwrap(), "completed");
    }

    #[tokio::test]
    async fn test_wait_terminal_wakes_up() {
        let store = Arc::new(TaskStore::new());
        let task = store.create("123");

        let waiter = tokio::spawn({
            let store = store.clone();
            let id = task.id;
            async move { store.wait_terminal(&id).await }
        });
        tokio::task::yield_now().await;
        store.update(&task.id, TaskUpdate::Failed("下载失败: boom".to_string())).unwrap();

        let finished = waiter.await.unwrap().unwrap();
        assert_eq!(finished.status, TaskStatus::Failed);
        assert!(store.wait_terminal(&Uuid::new_v4()).await.is_none());
    }

    #[test]
    fn test_concurrent_updates_to_different_tasks() {
        let store = Arc::new(TaskStore::new());
        let ids: Vec<_> = (0..32).map(|i| store.create(i.to_string()).id).collect();

        std::thread::scope(|scope| {
            for id in &ids {
                let store = store.clone();
                scope.spawn(move || {
                    store.update(id, TaskUpdate::Progress("进行中".to_string())).unwrap();
                    store.update(id, TaskUpdate::Failed("失败".to_string())).unwrap();
                });
            }
        });

        assert!(store.list().iter().all(|task| task.status == TaskStatus::Failed));
    }
}
