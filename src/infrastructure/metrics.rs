// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 安装 Prometheus 导出器
///
/// 未配置监听地址时不做任何事。必须在 tokio 运行时内调用。
pub fn init_metrics(listen: Option<&str>) {
    let Some(listen) = listen else {
        return;
    };

    let addr: SocketAddr = match listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", listen, e);
            return;
        }
    };

    // Ignore error if address is already in use
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    info!("Metrics exporter listening on {}", addr);
}
