// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{header, Client};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinSet};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::models::task::Task;
use crate::queue::tube::{QueueError, Tube};
use crate::utils::errors::{CallbackError, WorkerError};
use crate::workers::worker::Worker;

type UnitOutcome = (Task, Result<(), CallbackError>);

/// 通知分发器配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 同时进行的回调数量上限
    pub pool_size: usize,
    /// 取任务超时
    pub take_timeout: Duration,
    /// 单次回调的HTTP超时
    pub http_timeout: Duration,
    /// 本轮没有启动新回调时的等待时间
    pub sleep: Duration,
    /// 循环失败后重启前的等待时间
    pub sleep_on_fail: Duration,
}

/// 通知分发器
///
/// 从输出通道取任务，把结果 POST 到任务的回调地址。
/// 成功则确认任务，失败则埋葬任务，不自动重试。
pub struct NotificationDispatcher {
    output: Arc<dyn Tube>,
    client: Client,
    config: DispatcherConfig,
}

impl NotificationDispatcher {
    /// 创建新的通知分发器实例
    ///
    /// # 参数
    ///
    /// * `output` - 输出队列通道
    /// * `config` - 分发器配置
    ///
    /// # 返回值
    ///
    /// * `Ok(NotificationDispatcher)` - 分发器
    /// * `Err(reqwest::Error)` - HTTP客户端创建失败
    pub fn new(output: Arc<dyn Tube>, config: DispatcherConfig) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(concat!("hoptrace-notifier/", env!("CARGO_PKG_VERSION"))),
        );
        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            output,
            client,
            config,
        })
    }

    /// 运行一次分发循环，直到令牌取消或队列出错
    ///
    /// 返回前等待所有进行中的回调完成并结算。
    pub async fn run_once(&self, token: &CancellationToken) -> Result<(), QueueError> {
        let mut units: JoinSet<UnitOutcome> = JoinSet::new();
        let result = self.dispatch(&mut units, token).await;

        while let Some(joined) = units.join_next().await {
            self.settle(joined).await;
        }
        result
    }

    async fn dispatch(
        &self,
        units: &mut JoinSet<UnitOutcome>,
        token: &CancellationToken,
    ) -> Result<(), QueueError> {
        while !token.is_cancelled() {
            let mut started = false;
            while units.len() < self.config.pool_size && !token.is_cancelled() {
                match self.output.take(self.config.take_timeout).await? {
                    Some(task) => {
                        self.start_unit(units, task);
                        started = true;
                    }
                    None => break,
                }
            }

            while let Some(joined) = units.try_join_next() {
                self.settle(joined).await;
            }

            if !started {
                tokio::select! {
                    _ = sleep(self.config.sleep) => {}
                    _ = token.cancelled() => {}
                }
            }
        }
        Ok(())
    }

    fn start_unit(&self, units: &mut JoinSet<UnitOutcome>, task: Task) {
        let client = self.client.clone();
        let timeout = self.config.http_timeout;
        units.spawn(async move {
            let result = notify(&client, &task, timeout).await;
            (task, result)
        });
    }

    async fn settle(&self, joined: Result<UnitOutcome, JoinError>) {
        match joined {
            Ok((task, Ok(()))) => {
                counter!("callbacks_delivered_total").increment(1);
                if let Err(e) = self.output.ack(&task).await {
                    error!(task_id = %task.id, "Failed to ack notified task: {}", e);
                }
            }
            Ok((task, Err(e))) => {
                counter!("callbacks_failed_total").increment(1);
                warn!(task_id = %task.id, "Callback failed, burying task: {}", e);
                if let Err(e) = self.output.bury(&task).await {
                    error!(task_id = %task.id, "Failed to bury task: {}", e);
                }
            }
            Err(e) => error!("Dispatch unit panicked: {}", e),
        }
    }
}

#[async_trait]
impl Worker for NotificationDispatcher {
    async fn run(&self, token: CancellationToken) -> Result<(), WorkerError> {
        info!(
            tube = self.output.name(),
            pool_size = self.config.pool_size,
            "Notification dispatcher started"
        );

        while !token.is_cancelled() {
            match self.run_once(&token).await {
                Ok(()) => break,
                Err(e) => {
                    error!("Dispatcher loop failed: {}", e);
                    tokio::select! {
                        _ = sleep(self.config.sleep_on_fail) => {}
                        _ = token.cancelled() => {}
                    }
                }
            }
        }

        info!("Notification dispatcher stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "notification_dispatcher"
    }
}

/// 回调负载：去掉 `callback_url` 的任务数据，加上队列任务ID `id`
pub fn callback_payload(task: &Task) -> Result<Value, serde_json::Error> {
    let mut payload = serde_json::to_value(&task.data)?;
    if let Value::Object(map) = &mut payload {
        map.remove("callback_url");
        map.insert("id".to_string(), Value::String(task.id.clone()));
    }
    Ok(payload)
}

/// 向任务的回调地址发送一次通知
pub async fn notify(client: &Client, task: &Task, timeout: Duration) -> Result<(), CallbackError> {
    let url = task
        .data
        .callback_url
        .as_deref()
        .ok_or(CallbackError::MissingCallbackUrl)?;
    let payload = callback_payload(task)?;

    info!(task_id = %task.id, "Sending callback to {}", url);
    let start = Instant::now();
    let response = client.post(url).json(&payload).timeout(timeout).send().await;
    histogram!("callback_duration_seconds").record(start.elapsed().as_secs_f64());

    let response = response?;
    if !response.status().is_success() {
        return Err(CallbackError::Status(response.status().as_u16()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "notification_dispatcher_test.rs"]
mod tests;
