use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use handlebars::{no_escape, Handlebars};
use serde_json::json;
use tokio::process::Command;

use super::{Album, AlbumDownloader, DownloadRequest};
use crate::config::DownloaderConfig;
use crate::error::DownloadError;

/// stderr 只保留末尾的这部分，避免把整段下载日志塞进任务消息
const STDERR_TAIL_CHARS: usize = 500;

/// 通过外部程序下载相册。
///
/// 程序以配置中的参数模板启动，成功时需以 0 退出，并在标准输出的最后一行
/// 打印相册信息 JSON：`{"id": "JM123456", "title": "..."}`。
pub struct CommandDownloader {
    program: String,
    arg_count: usize,
    templates: Handlebars<'static>,
}

impl CommandDownloader {
    pub fn new(config: &DownloaderConfig) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates.register_escape_fn(no_escape);
        for (i, arg) in config.args.iter().enumerate() {
            templates
                .register_template_string(&arg_template_name(i), arg)
                .with_context(|| format!("下载参数模板无效: {}", arg))?;
        }
        Ok(Self {
            program: config.program.clone(),
            arg_count: config.args.len(),
            templates,
        })
    }

    fn render_args(&self, request: &DownloadRequest) -> Result<Vec<String>, handlebars::RenderError> {
        let data = json!({
            "album_id": request.album_id.as_str(),
            "option_file": request.option_file.display().to_string(),
            "max_chapters": request.max_chapters,
        });
        let mut args = Vec::with_capacity(self.arg_count);
        for i in 0..self.arg_count {
            let arg = self.templates.render(&arg_template_name(i), &data)?;
            if !arg.is_empty() {
                args.push(arg);
            }
        }
        Ok(args)
    }
}

fn arg_template_name(index: usize) -> String {
    format!("arg{index}")
}

/// 从后往前找第一行可以解析为相册信息的输出
fn parse_album(stdout: &str) -> Option<Album> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find_map(|line| serde_json::from_str::<Album>(line).ok())
}

fn tail(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

#[async_trait]
impl AlbumDownloader for CommandDownloader {
    async fn download(&self, request: &DownloadRequest) -> Result<Album, DownloadError> {
        let args = self.render_args(request).map_err(|e| DownloadError::Upstream {
            status: "参数渲染失败".to_string(),
            stderr: e.to_string(),
        })?;
        debug!("启动下载程序: {} {:?}", self.program, args);

        // kill_on_drop 保证任务被取消或超时时子进程一起结束
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DownloadError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DownloadError::Upstream {
                status: output.status.to_string(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_CHARS),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_album(&stdout).ok_or_else(|| DownloadError::NoAlbum(request.album_id.to_string()))
    }
}
