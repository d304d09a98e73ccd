// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 队列任务
///
/// 从某个队列通道（tube）中取出的工作单元。任务在被确认（ack）、
/// 埋葬（bury）或租约过期之前，由取出它的消费者独占持有。
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// 队列分配的不透明标识符
    pub id: String,
    /// 任务数据，已在队列边界完成校验
    pub data: TaskData,
}

impl Task {
    pub fn new(id: impl Into<String>, data: TaskData) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// 任务数据
///
/// 必填字段 `url` 加上流水线写入的结果字段，其余调用方自定义字段
/// 原样保存在 `extra` 中并随任务转发。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    /// 起始URL
    pub url: String,
    /// 调用方的URL标识
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_id: Option<Value>,
    /// 是否为复查任务
    #[serde(default)]
    pub recheck: bool,
    /// 可疑标记，存在即视为已标记
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspicious: Option<Value>,
    /// 结果回调地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    /// 每一跳的重定向类型
    #[serde(default)]
    pub redirect_types: Vec<RedirectType>,
    /// 访问过的URL，按顺序
    #[serde(default)]
    pub urls: Vec<String>,
    /// 匹配到的计数器名称
    #[serde(default)]
    pub counters: Vec<String>,
    /// 调用方扩展字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskData {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 解析并校验原始任务数据
    pub fn from_json(raw: &str) -> Result<Self, TaskDataError> {
        let data: TaskData = serde_json::from_str(raw)?;
        if data.url.trim().is_empty() {
            return Err(TaskDataError::MissingUrl);
        }
        Ok(data)
    }

    pub fn is_suspicious(&self) -> bool {
        matches!(&self.suspicious, Some(v) if !v.is_null())
    }

    /// 写入重定向链结果
    pub fn apply_chain(&mut self, chain: &ChainResult) {
        self.redirect_types = chain.types.clone();
        self.urls = chain.urls.clone();
        self.counters = chain.counters.iter().cloned().collect();
    }
}

/// 任务数据错误
#[derive(Error, Debug)]
pub enum TaskDataError {
    #[error("Malformed task data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Task data has no url")]
    MissingUrl,
}

/// 重定向类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectType {
    /// HTTP状态码重定向（Location）
    HttpStatus,
    /// HTML meta refresh 重定向
    MetaTag,
    /// 抓取失败
    Error,
}

impl fmt::Display for RedirectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RedirectType::HttpStatus => write!(f, "http_status"),
            RedirectType::MetaTag => write!(f, "meta_tag"),
            RedirectType::Error => write!(f, "error"),
        }
    }
}

impl FromStr for RedirectType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http_status" => Ok(RedirectType::HttpStatus),
            "meta_tag" => Ok(RedirectType::MetaTag),
            "error" => Ok(RedirectType::Error),
            _ => Err(()),
        }
    }
}

/// 重定向链结果
///
/// 正常结束时 `urls.len() == types.len() + 1`；
/// 首跳即网络错误时 `types == [Error]` 且 `urls` 只包含起始URL。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainResult {
    pub types: Vec<RedirectType>,
    pub urls: Vec<String>,
    pub counters: BTreeSet<String>,
}

impl ChainResult {
    pub fn ended_in_error(&self) -> bool {
        self.types.last() == Some(&RedirectType::Error)
    }
}

/// 路由决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// 放回输入通道稍后重新检查
    Input,
    /// 转发到输出通道等待通知
    Output,
}

impl Route {
    /// 根据链结果和任务标记决定去向
    ///
    /// 只有未标记复查、未标记可疑且以错误结束的任务才回到输入通道。
    pub fn decide(chain: &ChainResult, data: &TaskData) -> Self {
        if chain.ended_in_error() && !data.recheck && !data.is_suspicious() {
            Route::Input
        } else {
            Route::Output
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Route::Input => write!(f, "input"),
            Route::Output => write!(f, "output"),
        }
    }
}
