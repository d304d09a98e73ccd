// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::services::counter_registry::{
    default_counter_patterns, CounterPattern, CounterRegistry,
};
use crate::domain::services::terminal_domains::{TerminalDomains, DEFAULT_TERMINAL_PATTERN};

/// 应用程序配置设置
///
/// 包含两个队列通道、工作进程、监督进程、通知推送器和匹配模式等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 输入队列通道
    pub input_queue: QueueSettings,
    /// 输出队列通道
    pub output_queue: QueueSettings,
    /// 队列超时与租约
    pub queue: QueueTimingSettings,
    /// 重定向工作进程配置
    pub worker: WorkerSettings,
    /// 工作进程池监督配置
    pub supervisor: SupervisorSettings,
    /// 通知推送器配置
    pub pusher: PusherSettings,
    /// 终止域名与计数器模式
    #[serde(default)]
    pub patterns: PatternSettings,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingSettings,
    /// 指标配置
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// 队列通道连接配置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// Redis连接URL
    pub url: String,
    /// 命名空间
    pub namespace: String,
    /// 通道名称
    pub tube: String,
}

/// 队列超时与租约配置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueTimingSettings {
    /// 取任务超时（秒）
    pub take_timeout_secs: u64,
    /// 任务租约时长（秒）
    pub lease_secs: u64,
}

impl QueueTimingSettings {
    pub fn take_timeout(&self) -> Duration {
        Duration::from_secs(self.take_timeout_secs)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }
}

/// 重定向工作进程配置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// 工作进程数量
    pub pool_size: usize,
    /// 最大跳数
    pub max_redirects: usize,
    /// 单跳HTTP超时（秒）
    pub http_timeout_secs: u64,
    /// User-Agent 请求头
    pub user_agent: Option<String>,
    /// 回到输入通道的任务的延迟（秒）
    pub recheck_delay_secs: u64,
    /// 队列错误后的等待时间（秒）
    pub sleep_on_fail_secs: u64,
    /// 存活标记文件
    pub liveness_file: PathBuf,
}

impl WorkerSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn recheck_delay(&self) -> Duration {
        Duration::from_secs(self.recheck_delay_secs)
    }

    pub fn sleep_on_fail(&self) -> Duration {
        Duration::from_secs(self.sleep_on_fail_secs)
    }
}

/// 工作进程池监督配置
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSettings {
    /// 每轮检查之间的间隔（秒）
    pub sleep_secs: u64,
    /// 网络可达性探测地址
    pub check_url: String,
    /// 探测超时（秒）
    pub network_timeout_secs: u64,
}

impl SupervisorSettings {
    pub fn sleep(&self) -> Duration {
        Duration::from_secs(self.sleep_secs)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }
}

/// 通知推送器配置
#[derive(Debug, Clone, Deserialize)]
pub struct PusherSettings {
    /// 并发回调数量上限
    pub pool_size: usize,
    /// 回调HTTP超时（秒）
    pub http_timeout_secs: u64,
    /// 空闲时的轮询间隔（毫秒）
    pub sleep_millis: u64,
    /// 循环失败后的等待时间（秒）
    pub sleep_on_fail_secs: u64,
}

impl PusherSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn sleep(&self) -> Duration {
        Duration::from_millis(self.sleep_millis)
    }

    pub fn sleep_on_fail(&self) -> Duration {
        Duration::from_secs(self.sleep_on_fail_secs)
    }
}

/// 终止域名与计数器模式
#[derive(Debug, Clone, Deserialize)]
pub struct PatternSettings {
    #[serde(default = "default_terminal_domains")]
    pub terminal_domains: Vec<String>,
    #[serde(default = "default_counter_patterns")]
    pub counters: Vec<CounterPattern>,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            terminal_domains: default_terminal_domains(),
            counters: default_counter_patterns(),
        }
    }
}

impl PatternSettings {
    pub fn terminal_domains(&self) -> Result<TerminalDomains, regex::Error> {
        TerminalDomains::new(&self.terminal_domains)
    }

    pub fn counter_registry(&self) -> Result<CounterRegistry, regex::Error> {
        CounterRegistry::new(&self.counters)
    }
}

fn default_terminal_domains() -> Vec<String> {
    vec![DEFAULT_TERMINAL_PATTERN.to_string()]
}

/// 日志配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// 是否输出JSON格式日志
    #[serde(default)]
    pub json: bool,
}

/// 指标配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSettings {
    /// Prometheus 监听地址，例如 `0.0.0.0:9100`
    #[serde(default)]
    pub listen: Option<String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 以及 `HOPTRACE` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// 从指定文件加载配置
    ///
    /// 文件必须存在；环境变量仍然覆盖文件中的值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Queue channels
            .set_default("input_queue.url", "redis://127.0.0.1:6379")?
            .set_default("input_queue.namespace", "hoptrace")?
            .set_default("input_queue.tube", "input")?
            .set_default("output_queue.url", "redis://127.0.0.1:6379")?
            .set_default("output_queue.namespace", "hoptrace")?
            .set_default("output_queue.tube", "output")?
            .set_default("queue.take_timeout_secs", 1)?
            .set_default("queue.lease_secs", 300)?
            // Redirect workers
            .set_default("worker.pool_size", 10)?
            .set_default("worker.max_redirects", 20)?
            .set_default("worker.http_timeout_secs", 3)?
            .set_default("worker.recheck_delay_secs", 300)?
            .set_default("worker.sleep_on_fail_secs", 10)?
            .set_default("worker.liveness_file", "/tmp/hoptrace.alive")?
            // Supervisor
            .set_default("supervisor.sleep_secs", 10)?
            .set_default("supervisor.check_url", "http://ya.ru")?
            .set_default("supervisor.network_timeout_secs", 3)?
            // Notification pusher
            .set_default("pusher.pool_size", 10)?
            .set_default("pusher.http_timeout_secs", 3)?
            .set_default("pusher.sleep_millis", 100)?
            .set_default("pusher.sleep_on_fail_secs", 10)?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => {
                let env =
                    std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
                builder
                    .add_source(File::with_name("config/default").required(false))
                    .add_source(File::with_name(&format!("config/{}", env)).required(false))
            }
        };

        builder
            .add_source(Environment::with_prefix("HOPTRACE").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
