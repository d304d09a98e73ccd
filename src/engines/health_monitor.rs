// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

use crate::engines::traits::{EngineError, NetworkProbe};

/// 网络可达性检查配置
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// 目标URL
    pub target_url: String,
    /// 超时时间
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            target_url: "http://ya.ru".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

/// 网络健康监控器
///
/// 对单个配置的URL发起请求，只要拿到任何HTTP响应即视为网络可达。
pub struct NetworkHealthMonitor {
    client: Client,
    config: HealthCheckConfig,
}

impl NetworkHealthMonitor {
    pub fn new(config: HealthCheckConfig) -> Result<Self, EngineError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn target_url(&self) -> &str {
        &self.config.target_url
    }
}

#[async_trait]
impl NetworkProbe for NetworkHealthMonitor {
    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.config.target_url).send().await {
            Ok(_) => true,
            Err(e) => {
                warn!(url = %self.config.target_url, "Network check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reachable_on_any_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let monitor = NetworkHealthMonitor::new(HealthCheckConfig {
            target_url: server.uri(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        assert!(monitor.is_reachable().await);
    }

    #[tokio::test]
    async fn test_unreachable_on_connection_error() {
        // Nothing listens on the discard port of localhost in the test environment.
        let monitor = NetworkHealthMonitor::new(HealthCheckConfig {
            target_url: "http://127.0.0.1:9/".to_string(),
            timeout: Duration::from_millis(500),
        })
        .unwrap();
        assert!(!monitor.is_reachable().await);
    }
}
