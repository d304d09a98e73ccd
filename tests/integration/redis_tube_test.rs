// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 需要一个真实的 Redis，通过 `HOPTRACE_TEST_REDIS_URL` 指定，未设置时跳过。

use hoptrace::config::settings::QueueSettings;
use hoptrace::domain::models::task::TaskData;
use hoptrace::queue::redis_tube::RedisTube;
use hoptrace::queue::tube::{QueueError, Tube};
use std::time::Duration;
use uuid::Uuid;

async fn connect(lease: Duration) -> Option<RedisTube> {
    let url = std::env::var("HOPTRACE_TEST_REDIS_URL").ok()?;
    let settings = QueueSettings {
        url,
        namespace: format!("hoptrace-test-{}", Uuid::new_v4()),
        tube: "input".to_string(),
    };
    Some(RedisTube::connect(&settings, lease).await.unwrap())
}

#[tokio::test]
async fn test_redis_put_take_ack() {
    let Some(tube) = connect(Duration::from_secs(60)).await else {
        println!("Skipping: HOPTRACE_TEST_REDIS_URL not set");
        return;
    };

    let id = tube
        .put(&TaskData::new("http://a.test/"), Duration::ZERO)
        .await
        .unwrap();
    let task = tube.take(Duration::from_millis(500)).await.unwrap().unwrap();
    assert_eq!(task.id, id);
    assert_eq!(task.data.url, "http://a.test/");

    assert!(tube.take(Duration::from_millis(200)).await.unwrap().is_none());
    tube.ack(&task).await.unwrap();
    assert!(matches!(tube.ack(&task).await, Err(QueueError::NotTaken(_))));
}

#[tokio::test]
async fn test_redis_delayed_put_and_bury() {
    let Some(tube) = connect(Duration::from_secs(60)).await else {
        println!("Skipping: HOPTRACE_TEST_REDIS_URL not set");
        return;
    };

    tube.put(&TaskData::new("http://a.test/"), Duration::from_millis(300))
        .await
        .unwrap();
    assert!(tube.take(Duration::from_millis(100)).await.unwrap().is_none());
    let task = tube.take(Duration::from_secs(2)).await.unwrap().unwrap();

    tube.bury(&task).await.unwrap();
    assert!(matches!(tube.bury(&task).await, Err(QueueError::NotTaken(_))));
    assert!(tube.take(Duration::from_millis(200)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_redis_expired_lease_is_retaken() {
    let Some(tube) = connect(Duration::from_millis(200)).await else {
        println!("Skipping: HOPTRACE_TEST_REDIS_URL not set");
        return;
    };

    tube.put(&TaskData::new("http://a.test/"), Duration::ZERO)
        .await
        .unwrap();
    let first = tube.take(Duration::from_millis(500)).await.unwrap().unwrap();
    let second = tube.take(Duration::from_secs(2)).await.unwrap().unwrap();
    assert_eq!(first.id, second.id);
}
