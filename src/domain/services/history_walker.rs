// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use tracing::{debug, warn};

use crate::domain::models::task::{ChainResult, RedirectType};
use crate::domain::services::counter_registry::CounterRegistry;
use crate::domain::services::redirect_resolver::{RedirectResolver, Resolution};
use crate::utils::url_utils;

/// 重定向历史遍历器
///
/// 逐跳驱动解析器，构建有上限的重定向链，并累计命中的计数器。
#[derive(Clone)]
pub struct HistoryWalker {
    resolver: RedirectResolver,
    counters: CounterRegistry,
}

impl HistoryWalker {
    pub fn new(resolver: RedirectResolver, counters: CounterRegistry) -> Self {
        Self { resolver, counters }
    }

    /// 遍历重定向链
    ///
    /// 当 `urls` 长度达到 `max_hops + 1` 时无条件停止，即使还有后续重定向。
    pub async fn walk(&self, start_url: &str, max_hops: usize) -> ChainResult {
        let mut chain = ChainResult::default();
        let Some(mut current) = url_utils::prepare_url(Some(start_url)) else {
            return chain;
        };

        self.record(&mut chain, current.clone());
        if self.resolver.terminal_domains().is_terminal(&current) {
            debug!(url = %current, "Start url is already terminal");
            return chain;
        }

        while chain.urls.len() < max_hops + 1 {
            let hop = match self.resolver.resolve(&current).await {
                Ok(hop) => hop,
                Err(e) => {
                    warn!(url = %current, "Fetch failed: {}", e);
                    chain.types.push(RedirectType::Error);
                    break;
                }
            };

            if let Some(content) = &hop.content {
                chain.counters.extend(self.counters.matches(content));
            }

            match hop.resolution {
                Resolution::Redirect { url, kind } => {
                    debug!(from = %current, to = %url, kind = %kind, "Redirect hop");
                    chain.types.push(kind);
                    self.record(&mut chain, url.clone());
                    current = url;
                }
                Resolution::Terminal { url } => {
                    debug!(url = %url, "Terminal domain reached");
                    self.record(&mut chain, url);
                    break;
                }
                Resolution::NoRedirect => break,
            }
        }

        chain
    }

    fn record(&self, chain: &mut ChainResult, url: String) {
        chain.counters.extend(self.counters.matches(&url));
        chain.urls.push(url);
    }
}
