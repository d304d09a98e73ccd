// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use nix::sys::signal::Signal;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 信号导致退出时，退出码 = 偏移量 + 信号编号
pub const SIGNAL_EXIT_CODE_OFFSET: i32 = 128;

/// 停止句柄
///
/// 包装一个取消令牌和进程退出码。信号到达时记录退出码并取消令牌，
/// 各个循环在每次迭代开始时检查令牌。
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    exit_code: Arc<AtomicI32>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 因信号停止
    pub fn stop_by_signal(&self, signum: i32) {
        info!("Received signal {}, stopping", signum);
        self.exit_code
            .store(SIGNAL_EXIT_CODE_OFFSET + signum, Ordering::SeqCst);
        self.token.cancel();
    }

    /// 进程退出码，未收到信号时为 0
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// 安装 SIGTERM / SIGINT / SIGHUP / SIGQUIT 处理
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn listen_for_signals(&self) -> std::io::Result<JoinHandle<()>> {
        let mut term = signal(SignalKind::terminate())?;
        let mut int = signal(SignalKind::interrupt())?;
        let mut hup = signal(SignalKind::hangup())?;
        let mut quit = signal(SignalKind::quit())?;
        let shutdown = self.clone();

        Ok(tokio::spawn(async move {
            let signum = tokio::select! {
                _ = term.recv() => Signal::SIGTERM as i32,
                _ = int.recv() => Signal::SIGINT as i32,
                _ = hup.recv() => Signal::SIGHUP as i32,
                _ = quit.recv() => Signal::SIGQUIT as i32,
                _ = shutdown.token.cancelled() => return,
            };
            shutdown.stop_by_signal(signum);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::raise;
    use parking_lot::Mutex;
    use std::time::Duration;

    // raised signals reach every live listener in the test binary
    static SIGNALS: Mutex<()> = Mutex::new(());

    #[test]
    fn test_exit_code_is_zero_without_signal() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.exit_code(), 0);
        assert!(!shutdown.token().is_cancelled());
    }

    #[test]
    fn test_signal_sets_offset_exit_code() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();
        shutdown.stop_by_signal(Signal::SIGTERM as i32);
        assert_eq!(shutdown.exit_code(), 143);
        assert!(token.is_cancelled());
        assert!(shutdown.clone().token().is_cancelled());
    }

    #[tokio::test]
    async fn test_listener_exits_when_stopped_elsewhere() {
        let _guard = SIGNALS.lock();
        let shutdown = Shutdown::new();
        let handle = shutdown.listen_for_signals().unwrap();
        shutdown.token().cancel();
        handle.await.unwrap();
        assert_eq!(shutdown.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_each_stop_signal_is_handled_gracefully() {
        let _guard = SIGNALS.lock();
        for (sig, expected) in [
            (Signal::SIGTERM, 143),
            (Signal::SIGINT, 130),
            (Signal::SIGHUP, 129),
            (Signal::SIGQUIT, 131),
        ] {
            let shutdown = Shutdown::new();
            let handle = shutdown.listen_for_signals().unwrap();
            raise(sig).unwrap();

            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(shutdown.exit_code(), expected, "{}", sig);
            assert!(shutdown.token().is_cancelled());
        }
    }
}
