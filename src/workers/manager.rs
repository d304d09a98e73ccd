// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, gauge};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engines::traits::NetworkProbe;
use crate::utils::errors::SupervisorError;

/// 受监管的工作进程句柄
pub trait WorkerHandle: Send {
    /// 进程ID
    fn id(&self) -> u32;

    /// 进程是否已经退出
    fn has_exited(&mut self) -> bool;

    /// 请求进程终止（SIGTERM），不等待退出
    fn terminate(&mut self);
}

/// 工作进程启动器
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self) -> Result<Box<dyn WorkerHandle>, SupervisorError>;
}

/// 以子进程方式运行的工作进程
pub struct ChildHandle {
    pid: u32,
    child: Child,
}

impl ChildHandle {
    /// 接管一个仍在运行的子进程
    ///
    /// 已被回收的子进程没有 pid，视为启动失败。
    pub fn new(child: Child) -> Result<Self, SupervisorError> {
        let pid = child.id().ok_or_else(|| {
            SupervisorError::Spawn(io::Error::other("worker exited before its pid was read"))
        })?;
        Ok(Self { pid, child })
    }
}

impl WorkerHandle for ChildHandle {
    fn id(&self) -> u32 {
        self.pid
    }

    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self) {
        if let Err(e) = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            warn!(pid = self.pid, "Failed to signal worker: {}", e);
        }
    }
}

/// 启动 `program args...` 子进程
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// 以 `worker` 子命令重新启动当前可执行文件
    pub fn current_exe(
        config_path: Option<&Path>,
        liveness_file: &Path,
    ) -> Result<Self, SupervisorError> {
        let program = std::env::current_exe().map_err(SupervisorError::Spawn)?;
        let mut args: Vec<OsString> = Vec::new();
        if let Some(config_path) = config_path {
            args.push("--config".into());
            args.push(config_path.into());
        }
        args.push("worker".into());
        args.push("--liveness-file".into());
        args.push(liveness_file.into());
        Ok(Self::new(program, args))
    }
}

impl WorkerSpawner for ProcessSpawner {
    fn spawn(&self) -> Result<Box<dyn WorkerHandle>, SupervisorError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .spawn()
            .map_err(SupervisorError::Spawn)?;
        Ok(Box::new(ChildHandle::new(child)?))
    }
}

/// 监管状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    Degraded,
    Stopping,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SupervisorState::Running => write!(f, "running"),
            SupervisorState::Degraded => write!(f, "degraded"),
            SupervisorState::Stopping => write!(f, "stopping"),
            SupervisorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// 工作进程池监管器
///
/// 维持目标数量的工作进程；网络不可达时终止全部工作进程并暂停补充，
/// 网络恢复后继续补充。进程注册表只由监管器自身修改。
pub struct Supervisor {
    probe: Arc<dyn NetworkProbe>,
    spawner: Box<dyn WorkerSpawner>,
    pool_size: usize,
    interval: Duration,
    liveness_file: PathBuf,
    workers: HashMap<u32, Box<dyn WorkerHandle>>,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(
        probe: Arc<dyn NetworkProbe>,
        spawner: Box<dyn WorkerSpawner>,
        pool_size: usize,
        interval: Duration,
        liveness_file: PathBuf,
    ) -> Self {
        Self {
            probe,
            spawner,
            pool_size,
            interval,
            liveness_file,
            workers: HashMap::new(),
            state: SupervisorState::Running,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// 当前登记的存活工作进程数量
    pub fn live_count(&self) -> usize {
        self.workers.len()
    }

    /// 执行一轮检查
    pub async fn tick(&mut self) {
        self.reap();

        if self.probe.is_reachable().await {
            if self.state == SupervisorState::Degraded {
                info!("Network is reachable again, resuming");
            }
            self.state = SupervisorState::Running;
            self.spawn_deficit();
        } else {
            if self.state != SupervisorState::Degraded {
                warn!("Network is unreachable, stopping all workers");
            }
            self.state = SupervisorState::Degraded;
            self.terminate_all();
        }

        gauge!("live_workers").set(self.workers.len() as f64);
    }

    /// 运行监管循环直到令牌取消
    ///
    /// 启动时创建存活标记文件，停止时删除它；工作进程看到标记消失后自行退出。
    pub async fn run(&mut self, token: CancellationToken) -> Result<(), SupervisorError> {
        tokio::fs::write(&self.liveness_file, b"")
            .await
            .map_err(SupervisorError::Liveness)?;
        info!(
            pool_size = self.pool_size,
            liveness_file = %self.liveness_file.display(),
            "Supervisor started"
        );

        while !token.is_cancelled() {
            self.tick().await;
            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = token.cancelled() => {}
            }
        }

        self.state = SupervisorState::Stopping;
        info!(workers = self.workers.len(), "Supervisor stopping");
        if let Err(e) = tokio::fs::remove_file(&self.liveness_file).await {
            error!("Failed to remove liveness file: {}", e);
        }
        self.state = SupervisorState::Stopped;
        info!("Supervisor stopped");
        Ok(())
    }

    fn reap(&mut self) {
        self.workers.retain(|pid, handle| {
            let exited = handle.has_exited();
            if exited {
                debug!(pid = *pid, "Worker exited");
            }
            !exited
        });
    }

    fn spawn_deficit(&mut self) {
        let deficit = self.pool_size.saturating_sub(self.workers.len());
        for _ in 0..deficit {
            match self.spawner.spawn() {
                Ok(handle) => {
                    let pid = handle.id();
                    info!(pid, "Spawned worker");
                    counter!("workers_spawned_total").increment(1);
                    self.workers.insert(pid, handle);
                }
                Err(e) => {
                    error!("{}", e);
                    break;
                }
            }
        }
    }

    fn terminate_all(&mut self) {
        for (pid, mut handle) in self.workers.drain() {
            info!(pid, "Terminating worker");
            handle.terminate();
            counter!("workers_terminated_total").increment(1);
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
