// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化日志，`RUST_LOG` 覆盖默认过滤器
pub fn init_telemetry(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hoptrace=debug".into());

    let plain = (!json).then(tracing_subscriber::fmt::layer);
    let structured = json.then(|| tracing_subscriber::fmt::layer().json());

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .init();
}
