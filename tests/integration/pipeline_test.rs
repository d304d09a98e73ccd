// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{mount_three_hop_chain, redirect_worker, wait_for, walker};
use hoptrace::domain::models::task::{RedirectType, Route, TaskData};
use hoptrace::queue::memory::MemoryTube;
use hoptrace::queue::tube::Tube;
use hoptrace::workers::notification_dispatcher::{DispatcherConfig, NotificationDispatcher};
use hoptrace::workers::Worker;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_three_hop_chain_over_http() {
    let server = MockServer::start().await;
    mount_three_hop_chain(&server).await;

    let start = format!("{}/start", server.uri());
    let chain = walker().walk(&start, 10).await;

    assert_eq!(
        chain.types,
        vec![RedirectType::HttpStatus, RedirectType::MetaTag]
    );
    assert_eq!(
        chain.urls,
        vec![
            start.clone(),
            format!("{}/meta", server.uri()),
            format!("{}/end", server.uri()),
        ]
    );
    assert!(chain.counters.contains("LI_RU"));
}

#[tokio::test]
async fn test_hop_cap_on_redirect_loop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/a"))
        .mount(&server)
        .await;

    let chain = walker().walk(&format!("{}/a", server.uri()), 4).await;
    assert_eq!(chain.urls.len(), 5);
    assert!(chain.types.iter().all(|t| *t == RedirectType::HttpStatus));
}

#[tokio::test]
async fn test_unreachable_url_is_requeued() {
    let input = Arc::new(MemoryTube::new("input"));
    let output = Arc::new(MemoryTube::new("output"));
    let worker = redirect_worker(input.clone(), output.clone(), "/nonexistent".into());

    input
        .put(&TaskData::new("http://127.0.0.1:9/"), Duration::ZERO)
        .await
        .unwrap();
    let task = input.take(Duration::from_millis(50)).await.unwrap().unwrap();

    assert_eq!(worker.handle(task).await.unwrap(), Route::Input);
    assert_eq!(input.delayed_len(), 1);
    assert_eq!(output.ready_len(), 0);
}

#[tokio::test]
async fn test_worker_and_dispatcher_deliver_chain_to_callback() {
    let server = MockServer::start().await;
    mount_three_hop_chain(&server).await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let input = Arc::new(MemoryTube::new("input"));
    let output = Arc::new(MemoryTube::new("output"));
    let liveness = NamedTempFile::new().unwrap();

    let mut data = TaskData::new(format!("{}/start", server.uri()));
    data.url_id = Some(json!(17));
    data.callback_url = Some(format!("{}/callback", server.uri()));
    data.extra.insert("campaign".to_string(), json!("spring"));
    input.put(&data, Duration::ZERO).await.unwrap();

    let worker = Arc::new(redirect_worker(
        input.clone(),
        output.clone(),
        liveness.path().to_path_buf(),
    ));
    let dispatcher = Arc::new(
        NotificationDispatcher::new(
            output.clone(),
            DispatcherConfig {
                pool_size: 4,
                take_timeout: Duration::from_millis(50),
                http_timeout: Duration::from_secs(2),
                sleep: Duration::from_millis(10),
                sleep_on_fail: Duration::from_millis(10),
            },
        )
        .unwrap(),
    );

    let token = CancellationToken::new();
    let worker_handle = {
        let (worker, token) = (worker.clone(), token.clone());
        tokio::spawn(async move { worker.run(token).await })
    };
    let dispatcher_handle = {
        let (dispatcher, token) = (dispatcher.clone(), token.clone());
        tokio::spawn(async move { dispatcher.run(token).await })
    };

    let delivered = {
        let (input, output) = (input.clone(), output.clone());
        wait_for(move || {
            input.ready_len() == 0
                && input.taken_len() == 0
                && output.ready_len() == 0
                && output.taken_len() == 0
        })
        .await
    };
    token.cancel();
    worker_handle.await.unwrap().unwrap();
    dispatcher_handle.await.unwrap().unwrap();
    assert!(delivered);
    assert_eq!(output.buried_len(), 0);

    let requests = server.received_requests().await.unwrap();
    let callback = requests
        .iter()
        .find(|r| r.url.path() == "/callback")
        .unwrap();
    let body: Value = serde_json::from_slice(&callback.body).unwrap();
    assert_eq!(body["url_id"], json!(17));
    assert_eq!(body["campaign"], json!("spring"));
    assert_eq!(body["redirect_types"], json!(["http_status", "meta_tag"]));
    assert_eq!(body["urls"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["counters"], json!(["LI_RU"]));
    assert!(body["id"].is_string());
    assert!(body.get("callback_url").is_none());
}
