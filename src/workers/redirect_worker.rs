// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::domain::models::task::{Route, Task, TaskData};
use crate::domain::services::history_walker::HistoryWalker;
use crate::queue::tube::Tube;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;

/// 重定向工作器配置
#[derive(Debug, Clone)]
pub struct RedirectWorkerConfig {
    /// 最大跳数
    pub hop_limit: usize,
    /// 取任务超时，同时决定检查存活标记的频率
    pub take_timeout: Duration,
    /// 回到输入通道时的延迟
    pub recheck_delay: Duration,
    /// 队列错误后的等待时间
    pub sleep_on_fail: Duration,
    /// 存活标记文件，文件消失后工作器退出
    pub liveness_file: PathBuf,
}

/// 重定向工作器
///
/// 从输入通道取任务，遍历重定向链，把结果转发到输出通道
/// （或带延迟放回输入通道），转发成功后确认原任务。
pub struct RedirectWorker {
    walker: HistoryWalker,
    input: Arc<dyn Tube>,
    output: Arc<dyn Tube>,
    config: RedirectWorkerConfig,
}

impl RedirectWorker {
    pub fn new(
        walker: HistoryWalker,
        input: Arc<dyn Tube>,
        output: Arc<dyn Tube>,
        config: RedirectWorkerConfig,
    ) -> Self {
        Self {
            walker,
            input,
            output,
            config,
        }
    }

    /// 处理一个任务数据
    ///
    /// 返回路由决策和写入了链结果的新任务数据。
    pub async fn process_one(&self, data: &TaskData, hop_limit: usize) -> (Route, TaskData) {
        let chain = self.walker.walk(&data.url, hop_limit).await;
        let route = Route::decide(&chain, data);

        let mut forwarded = data.clone();
        forwarded.apply_chain(&chain);
        (route, forwarded)
    }

    /// 处理并转发一个已取出的任务
    ///
    /// 只有转发写入成功才确认原任务；确认失败只记录日志。
    #[instrument(skip(self, task), fields(task_id = %task.id, url = %task.data.url))]
    pub async fn handle(&self, task: Task) -> Result<Route, WorkerError> {
        let (route, data) = self.process_one(&task.data, self.config.hop_limit).await;

        let (target, delay) = match route {
            Route::Input => (&self.input, self.config.recheck_delay),
            Route::Output => (&self.output, Duration::ZERO),
        };
        let new_id = target.put(&data, delay).await?;
        debug!(
            route = %route,
            new_task_id = %new_id,
            hops = data.redirect_types.len(),
            "Task forwarded"
        );

        if let Err(e) = self.input.ack(&task).await {
            error!("Failed to ack task: {}", e);
        }
        Ok(route)
    }

    fn is_alive(&self) -> bool {
        self.config.liveness_file.exists()
    }
}

#[async_trait]
impl Worker for RedirectWorker {
    async fn run(&self, token: CancellationToken) -> Result<(), WorkerError> {
        info!(
            input = self.input.name(),
            output = self.output.name(),
            "Redirect worker started"
        );

        while !token.is_cancelled() && self.is_alive() {
            match self.input.take(self.config.take_timeout).await {
                Ok(Some(task)) => {
                    if let Err(e) = self.handle(task).await {
                        error!("Failed to forward task: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to take task: {}", e);
                    tokio::select! {
                        _ = sleep(self.config.sleep_on_fail) => {}
                        _ = token.cancelled() => {}
                    }
                }
            }
        }

        info!("Redirect worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "redirect_worker"
    }
}

#[cfg(test)]
#[path = "redirect_worker_test.rs"]
mod tests;
