use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ::clap::Parser;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

mod clap;

pub use crate::config::clap::{version, Args};

/// 全局的 ARGS，用来解析命令行参数
pub static ARGS: Lazy<Args> = Lazy::new(Args::parse);

/// 全局的 CONFIG_DIR，表示配置文件夹的路径
pub static CONFIG_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jm-web")
});

pub const DEFAULT_FUZZY_THRESHOLD: u8 = 70;

/// 默认下载程序通过 `python3 -c` 执行的脚本，调用 jmcomic 下载并打印相册信息
pub const DOWNLOAD_SCRIPT: &str = include_str!("../../scripts/jm_download.py");

fn default_bind_address() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_pdf_dir() -> PathBuf {
    CONFIG_DIR.join("books").join("pdf")
}

fn default_option_file() -> PathBuf {
    CONFIG_DIR.join("config.yml")
}

fn default_album_prefix() -> String {
    "JM".to_string()
}

fn default_fuzzy_threshold() -> u8 {
    DEFAULT_FUZZY_THRESHOLD
}

fn default_concurrent_downloads() -> usize {
    4
}

fn default_program() -> String {
    "python3".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "-c".to_string(),
        DOWNLOAD_SCRIPT.to_string(),
        "{{album_id}}".to_string(),
        "{{option_file}}".to_string(),
        "{{#if max_chapters}}{{max_chapters}}{{/if}}".to_string(),
    ]
}

/// 外部下载程序的调用方式，`args` 中的每一项都是 handlebars 模板，
/// 可用变量为 `album_id`、`option_file`、`max_chapters`，渲染为空的参数会被丢弃
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloaderConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 下载程序生成 PDF 的目录，Web 端只读
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
    /// 交给下载程序的 YAML 配置，本服务不解析其内容
    #[serde(default = "default_option_file")]
    pub option_file: PathBuf,
    #[serde(default = "default_album_prefix")]
    pub album_prefix: String,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: u8,
    #[serde(default = "default_concurrent_downloads")]
    pub concurrent_downloads: usize,
    /// 单个任务的超时时间（秒），不设置则不限制
    #[serde(default)]
    pub download_timeout: Option<u64>,
    #[serde(default)]
    pub downloader: DownloaderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            pdf_dir: default_pdf_dir(),
            option_file: default_option_file(),
            album_prefix: default_album_prefix(),
            fuzzy_threshold: default_fuzzy_threshold(),
            concurrent_downloads: default_concurrent_downloads(),
            download_timeout: None,
            downloader: DownloaderConfig::default(),
        }
    }
}

impl Config {
    /// 读取配置文件，文件不存在时写入默认配置
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("配置文件 {} 不存在，使用默认配置并写入", path.display());
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(path).with_context(|| format!("读取配置文件 {} 失败", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("解析配置文件 {} 失败", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("创建目录 {} 失败", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        std::fs::write(path, content).with_context(|| format!("写入配置文件 {} 失败", path.display()))?;
        Ok(())
    }

    pub fn download_timeout(&self) -> Option<Duration> {
        self.download_timeout.filter(|secs| *secs > 0).map(Duration::from_secs)
    }

    /// 检查配置，所有问题都会打印出来
    pub fn check(&self) -> bool {
        let mut ok = true;
        if !self.pdf_dir.is_absolute() {
            ok = false;
            error!("pdf_dir 应为绝对路径，检测到: {}", self.pdf_dir.display());
        }
        if self.album_prefix.is_empty() {
            ok = false;
            error!("未设置 album_prefix");
        }
        if self.fuzzy_threshold > 100 {
            ok = false;
            error!("fuzzy_threshold 必须在 0 到 100 之间，检测到: {}", self.fuzzy_threshold);
        }
        if self.concurrent_downloads == 0 {
            ok = false;
            error!("concurrent_downloads 必须大于 0");
        }
        if self.downloader.program.trim().is_empty() {
            ok = false;
            error!("未设置下载程序 downloader.program");
        }
        if !self.option_file.exists() {
            // 每个任务开始时才会读取，这里只提醒
            warn!("下载配置文件 {} 暂不存在", self.option_file.display());
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            pdf_dir = "/data/books/pdf"
            fuzzy_threshold = 80

            [downloader]
            program = "python"
            "#,
        )
        .unwrap();
        assert_eq!(config.pdf_dir, PathBuf::from("/data/books/pdf"));
        assert_eq!(config.fuzzy_threshold, 80);
        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert_eq!(config.album_prefix, "JM");
        assert_eq!(config.concurrent_downloads, 4);
        assert_eq!(config.downloader.program, "python");
        assert_eq!(config.downloader.args, default_args());
        assert_eq!(config.download_timeout(), None);
    }

    #[test]
    fn test_load_writes_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_check_rejects_invalid_values() {
        let mut config = Config {
            pdf_dir: std::env::temp_dir(),
            ..Config::default()
        };
        assert!(config.check());
        config.fuzzy_threshold = 101;
        assert!(!config.check());
        config.fuzzy_threshold = 70;
        config.concurrent_downloads = 0;
        assert!(!config.check());
    }

    #[test]
    fn test_zero_timeout_means_unlimited() {
        let config = Config {
            download_timeout: Some(0),
            ..Config::default()
        };
        assert_eq!(config.download_timeout(), None);
        let config = Config {
            download_timeout: Some(600),
            ..Config::default()
        };
        assert_eq!(config.download_timeout(), Some(Duration::from_secs(600)));
    }
}
