pub mod filenamify;
pub mod signal;

use std::collections::VecDeque;
use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use utoipa::ToSchema;

/// 内存中保留的日志条数上限
const LOG_BUFFER_CAPACITY: usize = 2000;

static LOG_BUFFER: Lazy<Mutex<VecDeque<LogEntry>>> =
    Lazy::new(|| Mutex::new(VecDeque::with_capacity(LOG_BUFFER_CAPACITY)));

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
    pub target: String,
}

pub fn add_log_entry(level: &tracing::Level, message: String, target: &str) {
    let mut buffer = LOG_BUFFER.lock();
    if buffer.len() >= LOG_BUFFER_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(LogEntry {
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        level: level.as_str().to_lowercase(),
        message,
        target: target.to_string(),
    });
}

/// 最新的在前
pub fn recent_logs(limit: usize) -> Vec<LogEntry> {
    LOG_BUFFER.lock().iter().rev().take(limit).cloned().collect()
}

// 将日志同步写入内存缓冲区，供 /api/logs 查询
struct LogCaptureLayer;

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(message) = visitor.message {
            add_log_entry(event.metadata().level(), message, event.metadata().target());
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
}

pub fn init_logger(log_level: &str) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(
            "%b %d %H:%M:%S".to_owned(),
        ))
        .with_filter(build_filter(log_level));

    let log_capture_layer = LogCaptureLayer.with_filter(build_filter("jm_web=debug"));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(log_capture_layer)
        .try_init()
        .expect("初始化日志失败");
}

/// 压低 HTTP 栈的噪音日志
fn build_filter(base_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::builder().parse_lossy(format!(
        "{},\
            hyper=warn,\
            tower_http=info,\
            tokio_util=warn",
        base_level
    ))
}
