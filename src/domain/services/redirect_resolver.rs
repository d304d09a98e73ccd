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

use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::models::task::RedirectType;
use crate::domain::services::terminal_domains::TerminalDomains;
use crate::engines::traits::{EngineError, FetchRequest, HttpEngine};
use crate::utils::errors::ParseError;
use crate::utils::url_utils;

/// 单跳解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// 找到下一跳
    Redirect { url: String, kind: RedirectType },
    /// 重定向目标命中终止域名
    Terminal { url: String },
    /// 没有重定向，链自然结束
    NoRedirect,
}

/// 单跳解析输出
#[derive(Debug, Clone)]
pub struct ResolvedHop {
    pub resolution: Resolution,
    /// 抓取到的正文
    pub content: Option<String>,
}

/// 重定向解析器
///
/// 对一个URL执行一次抓取并判定下一跳。网络错误直接返回给调用方，
/// 这里不做任何重试。
#[derive(Clone)]
pub struct RedirectResolver {
    engine: Arc<dyn HttpEngine>,
    terminal: TerminalDomains,
    timeout: Duration,
    user_agent: Option<String>,
}

impl RedirectResolver {
    pub fn new(
        engine: Arc<dyn HttpEngine>,
        terminal: TerminalDomains,
        timeout: Duration,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            engine,
            terminal,
            timeout,
            user_agent,
        }
    }

    pub fn terminal_domains(&self) -> &TerminalDomains {
        &self.terminal
    }

    /// 解析一跳
    ///
    /// # 参数
    ///
    /// * `url` - 当前URL
    ///
    /// # 返回值
    ///
    /// * `Ok(ResolvedHop)` - 下一跳、终止信号或无重定向
    /// * `Err(EngineError)` - 抓取失败
    pub async fn resolve(&self, url: &str) -> Result<ResolvedHop, EngineError> {
        let request = FetchRequest::new(url, self.timeout).with_user_agent(self.user_agent.clone());
        let response = self.engine.fetch(&request).await?;

        let resolution = match response.redirect_target.as_deref() {
            Some(target) => self.classify_location(url, target),
            None => match check_for_meta(&response.content, url) {
                Ok(Some(target)) if self.terminal.is_terminal(&target) => terminal_hop(&target),
                Ok(Some(target)) => next_hop(&target, RedirectType::MetaTag),
                Ok(None) => Resolution::NoRedirect,
                Err(e) => {
                    debug!(url = %url, "Meta refresh ignored: {}", e);
                    Resolution::NoRedirect
                }
            },
        };

        Ok(ResolvedHop {
            resolution,
            content: Some(response.content),
        })
    }

    fn classify_location(&self, url: &str, target: &str) -> Resolution {
        if self.terminal.is_terminal(target) {
            return terminal_hop(target);
        }

        let candidate = if !url_utils::has_scheme(target) {
            url_utils::join_url(url, target)
        } else if url_utils::is_market_url(target) {
            url_utils::fix_market_url(target)
        } else {
            target.to_string()
        };
        next_hop(&candidate, RedirectType::HttpStatus)
    }
}

fn terminal_hop(target: &str) -> Resolution {
    match url_utils::prepare_url(Some(target)) {
        Some(url) => Resolution::Terminal { url },
        None => Resolution::NoRedirect,
    }
}

fn next_hop(candidate: &str, kind: RedirectType) -> Resolution {
    match url_utils::prepare_url(Some(candidate)) {
        Some(url) => Resolution::Redirect { url, kind },
        None => Resolution::NoRedirect,
    }
}

/// 查找 meta refresh 重定向目标
///
/// `content` 必须是 `<delay>;url=<target>` 形式；目标为空时返回 `Ok(None)`。
/// 相对目标基于当前URL解析。
pub fn check_for_meta(content: &str, url: &str) -> Result<Option<String>, ParseError> {
    let refresh = match find_refresh_content(content)? {
        Some(refresh) => refresh,
        None => return Ok(None),
    };

    let parts: Vec<&str> = refresh.split(';').collect();
    if parts.len() != 2 {
        return Err(ParseError::PartCount(refresh));
    }

    let second = parts[1].trim();
    let idx = second
        .to_ascii_lowercase()
        .find("url=")
        .ok_or_else(|| ParseError::MissingUrl(refresh.clone()))?;

    let target = second[idx + 4..]
        .trim()
        .trim_matches(|c: char| c == '\'' || c == '"')
        .trim();
    if target.is_empty() {
        return Ok(None);
    }

    if url_utils::has_scheme(target) {
        Ok(Some(target.to_string()))
    } else {
        Ok(Some(url_utils::join_url(url, target)))
    }
}

fn find_refresh_content(content: &str) -> Result<Option<String>, ParseError> {
    let document = Html::parse_document(content);
    let selector = Selector::parse("meta").map_err(|e| ParseError::Selector(e.to_string()))?;

    let refresh = document.select(&selector).find_map(|element| {
        let meta = element.value();
        let is_refresh = meta
            .attr("http-equiv")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"));
        if is_refresh {
            meta.attr("content").map(|c| c.to_string())
        } else {
            None
        }
    });
    Ok(refresh)
}

#[cfg(test)]
#[path = "redirect_resolver_test.rs"]
mod tests;
