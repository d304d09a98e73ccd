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

use crate::engines::traits::{EngineError, FetchRequest, FetchResponse, HttpEngine};
use async_trait::async_trait;
use reqwest::header::{self, HeaderValue};
use reqwest::redirect::Policy;
use std::time::Instant;
use tracing::debug;

/// 默认 User-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; hoptrace/0.1)";

/// 基于reqwest的单跳抓取引擎
///
/// 客户端关闭了自动重定向，`Location` 头原样交给调用方。
#[derive(Clone)]
pub struct ReqwestEngine {
    client: reqwest::Client,
}

impl ReqwestEngine {
    pub fn new() -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpEngine for ReqwestEngine {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 状态码、正文以及重定向目标
    /// * `Err(EngineError)` - 网络或传输错误
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| EngineError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = self.client.get(url).timeout(request.timeout);
        if let Some(ua) = &request.user_agent {
            let value = HeaderValue::from_str(ua)
                .map_err(|e| EngineError::Other(format!("Invalid user agent: {}", e)))?;
            builder = builder.header(header::USER_AGENT, value);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status();

        let redirect_target = if status.is_redirection() {
            response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        } else {
            None
        };

        // a Location header decides the hop, the body is never inspected
        let content = match redirect_target {
            Some(_) => String::new(),
            None => response.text().await?,
        };

        debug!(
            url = %request.url,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(FetchResponse {
            status_code: status.as_u16(),
            content,
            redirect_target,
        })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
