// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskData};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// Redis错误
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 任务不在租约中
    #[error("Task {0} is not taken")]
    NotTaken(String),

    /// 其他错误
    #[error("Queue error: {0}")]
    Other(String),
}

/// 队列通道特质
///
/// 一个具名的逻辑队列。`take` 返回的任务由调用方独占持有，
/// 直到 `ack`、`bury` 或租约过期。
#[async_trait]
pub trait Tube: Send + Sync {
    /// 通道名称
    fn name(&self) -> &str;

    /// 取出一个任务，超时返回 `None`
    async fn take(&self, timeout: Duration) -> Result<Option<Task>, QueueError>;

    /// 确认完成并删除任务
    async fn ack(&self, task: &Task) -> Result<(), QueueError>;

    /// 埋葬任务（死信）
    async fn bury(&self, task: &Task) -> Result<(), QueueError>;

    /// 放入新任务，返回任务ID
    async fn put(&self, data: &TaskData, delay: Duration) -> Result<String, QueueError>;
}

#[async_trait]
impl<T: Tube + ?Sized> Tube for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn take(&self, timeout: Duration) -> Result<Option<Task>, QueueError> {
        (**self).take(timeout).await
    }

    async fn ack(&self, task: &Task) -> Result<(), QueueError> {
        (**self).ack(task).await
    }

    async fn bury(&self, task: &Task) -> Result<(), QueueError> {
        (**self).bury(task).await
    }

    async fn put(&self, data: &TaskData, delay: Duration) -> Result<String, QueueError> {
        (**self).put(data, delay).await
    }
}
