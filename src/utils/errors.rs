// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::queue::tube::QueueError;

/// meta refresh 解析错误
///
/// 只在解析器内部使用，调用方统一视为"未找到重定向"。
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Refresh content must have exactly two parts: {0}")]
    PartCount(String),

    #[error("Refresh content has no url= part: {0}")]
    MissingUrl(String),

    #[error("Invalid selector: {0}")]
    Selector(String),
}

/// 回调通知错误
#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("Task has no callback url")]
    MissingCallbackUrl,

    #[error("Callback request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Callback returned status {0}")]
    Status(u16),

    #[error("Callback payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("队列错误: {0}")]
    Queue(#[from] QueueError),
}

/// 进程监管错误
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Liveness file error: {0}")]
    Liveness(#[source] std::io::Error),
}
