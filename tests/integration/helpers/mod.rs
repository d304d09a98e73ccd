// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use hoptrace::domain::services::counter_registry::CounterRegistry;
use hoptrace::domain::services::history_walker::HistoryWalker;
use hoptrace::domain::services::redirect_resolver::RedirectResolver;
use hoptrace::domain::services::terminal_domains::TerminalDomains;
use hoptrace::engines::reqwest_engine::ReqwestEngine;
use hoptrace::engines::traits::HttpEngine;
use hoptrace::queue::memory::MemoryTube;
use hoptrace::workers::redirect_worker::{RedirectWorker, RedirectWorkerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const RECHECK_DELAY: Duration = Duration::from_secs(300);

pub fn walker() -> HistoryWalker {
    let engine: Arc<dyn HttpEngine> = Arc::new(ReqwestEngine::new().unwrap());
    let resolver = RedirectResolver::new(
        engine,
        TerminalDomains::new([r"\.redirect$"]).unwrap(),
        Duration::from_secs(2),
        Some("hoptrace-test".to_string()),
    );
    HistoryWalker::new(resolver, CounterRegistry::default())
}

pub fn redirect_worker(
    input: Arc<MemoryTube>,
    output: Arc<MemoryTube>,
    liveness_file: PathBuf,
) -> RedirectWorker {
    RedirectWorker::new(
        walker(),
        input,
        output,
        RedirectWorkerConfig {
            hop_limit: 10,
            take_timeout: Duration::from_millis(50),
            recheck_delay: RECHECK_DELAY,
            sleep_on_fail: Duration::from_millis(10),
            liveness_file,
        },
    )
}

/// `/start` 302 -> `/meta`，`/meta` meta refresh -> `/end`，`/end` 普通页面
pub async fn mount_three_hop_chain(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/meta"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta http-equiv="refresh" content="0; url=/end"></head></html>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/end"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><script src="//counter.yadro.ru/hit?q"></script></body></html>"#,
        ))
        .mount(server)
        .await;
}

/// 轮询直到条件成立或超时
pub async fn wait_for<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    for _ in 0..300 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
