use std::io;

#[cfg(target_family = "windows")]
pub async fn terminate() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// ctrl + c 发送的是 SIGINT，docker stop 发送的是 SIGTERM，两者都需要处理
#[cfg(target_family = "unix")]
pub async fn terminate() -> io::Result<()> {
    use tokio::select;
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    select! {
        _ = term.recv() => Ok(()),
        _ = int.recv() => Ok(()),
    }
}
