// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 引擎错误类型
///
/// 单跳抓取过程中的网络或传输错误，只终止当前跳。
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 无效URL
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

/// 抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    /// 超时时间
    pub timeout: Duration,
    /// User-Agent，未设置时使用引擎默认值
    pub user_agent: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// 抓取响应
///
/// 单跳结果，不跟随重定向。
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 响应内容
    pub content: String,
    /// 重定向目标（Location）
    pub redirect_target: Option<String>,
}

/// HTTP抓取引擎特质
#[async_trait]
pub trait HttpEngine: Send + Sync {
    /// 执行一次不跟随重定向的抓取
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}

/// 网络可达性探测
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}
