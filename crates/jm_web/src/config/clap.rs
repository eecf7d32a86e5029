use std::borrow::Cow;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "jm-web", version = version(), about, long_about = None)]
pub struct Args {
    /// 配置文件路径，默认为配置目录下的 config.toml
    #[arg(short, long, env = "JM_WEB_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, default_value = "None,jm_web=info", env = "RUST_LOG")]
    pub log_level: String,

    /// 覆盖配置文件中的监听地址
    #[arg(long, env = "JM_WEB_BIND")]
    pub bind_address: Option<String>,
}

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn version() -> Cow<'static, str> {
    Cow::Owned(format!(
        "{} ({}, {})",
        built_info::PKG_VERSION,
        built_info::PROFILE,
        built_info::RUSTC_VERSION
    ))
}
