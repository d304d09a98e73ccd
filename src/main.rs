// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand};
use hoptrace::config::settings::Settings;
use hoptrace::domain::services::history_walker::HistoryWalker;
use hoptrace::domain::services::redirect_resolver::RedirectResolver;
use hoptrace::engines::health_monitor::{HealthCheckConfig, NetworkHealthMonitor};
use hoptrace::engines::reqwest_engine::ReqwestEngine;
use hoptrace::engines::traits::HttpEngine;
use hoptrace::infrastructure::metrics::init_metrics;
use hoptrace::queue::redis_tube::RedisTube;
use hoptrace::queue::tube::Tube;
use hoptrace::utils::shutdown::Shutdown;
use hoptrace::utils::telemetry;
use hoptrace::workers::manager::{ProcessSpawner, Supervisor};
use hoptrace::workers::notification_dispatcher::{DispatcherConfig, NotificationDispatcher};
use hoptrace::workers::redirect_worker::{RedirectWorker, RedirectWorkerConfig};
use hoptrace::workers::Worker;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "hoptrace")]
#[command(about = "Follow URL redirect chains from a queue and report them over HTTP callbacks")]
#[command(version)]
struct Cli {
    /// Configuration file; environment variables still override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep a pool of redirect worker processes alive.
    Supervisor,

    /// Resolve redirect chains for tasks from the input queue.
    Worker {
        /// The worker exits once this file disappears.
        #[arg(long)]
        liveness_file: Option<PathBuf>,
    },

    /// Deliver finished tasks to their callback urls.
    Pusher,
}

/// 主函数
///
/// 加载配置、初始化日志，然后在单线程运行时中执行子命令。
/// 因信号退出时进程退出码为 128 + 信号编号。
fn main() {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    telemetry::init_telemetry(settings.logging.json);

    match run(cli, settings) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::from_file(path)?,
        None => Settings::new()?,
    };
    Ok(settings)
}

fn run(cli: Cli, settings: Arc<Settings>) -> anyhow::Result<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let shutdown = Shutdown::new();
        shutdown
            .listen_for_signals()
            .context("failed to install signal handlers")?;

        match cli.command {
            Commands::Supervisor => {
                run_supervisor(&settings, cli.config.as_deref(), &shutdown).await?
            }
            Commands::Worker { liveness_file } => {
                let liveness_file =
                    liveness_file.unwrap_or_else(|| settings.worker.liveness_file.clone());
                run_worker(&settings, liveness_file, &shutdown).await?
            }
            Commands::Pusher => run_pusher(&settings, &shutdown).await?,
        }

        Ok::<i32, anyhow::Error>(shutdown.exit_code())
    })
}

async fn run_supervisor(
    settings: &Settings,
    config_path: Option<&Path>,
    shutdown: &Shutdown,
) -> anyhow::Result<()> {
    info!("Starting supervisor...");
    init_metrics(settings.metrics.listen.as_deref());

    let probe = NetworkHealthMonitor::new(HealthCheckConfig {
        target_url: settings.supervisor.check_url.clone(),
        timeout: settings.supervisor.network_timeout(),
    })?;
    info!(check_url = probe.target_url(), "Network probe configured");
    let liveness_file = settings.worker.liveness_file.clone();
    let spawner = ProcessSpawner::current_exe(config_path, &liveness_file)?;

    let mut supervisor = Supervisor::new(
        Arc::new(probe),
        Box::new(spawner),
        settings.worker.pool_size,
        settings.supervisor.sleep(),
        liveness_file,
    );
    supervisor.run(shutdown.token()).await?;
    Ok(())
}

async fn run_worker(
    settings: &Settings,
    liveness_file: PathBuf,
    shutdown: &Shutdown,
) -> anyhow::Result<()> {
    info!(pid = std::process::id(), "Starting redirect worker...");

    let engine: Arc<dyn HttpEngine> = Arc::new(ReqwestEngine::new()?);
    debug!(engine = engine.name(), "Fetch engine ready");
    let terminal = settings
        .patterns
        .terminal_domains()
        .context("invalid terminal domain pattern")?;
    let counters = settings
        .patterns
        .counter_registry()
        .context("invalid counter pattern")?;
    let resolver = RedirectResolver::new(
        engine,
        terminal,
        settings.worker.http_timeout(),
        settings.worker.user_agent.clone(),
    );
    let walker = HistoryWalker::new(resolver, counters);

    let lease = settings.queue.lease();
    let input: Arc<dyn Tube> = Arc::new(
        RedisTube::connect(&settings.input_queue, lease)
            .await
            .context("failed to connect to the input queue")?,
    );
    let output: Arc<dyn Tube> = Arc::new(
        RedisTube::connect(&settings.output_queue, lease)
            .await
            .context("failed to connect to the output queue")?,
    );

    let worker = RedirectWorker::new(
        walker,
        input,
        output,
        RedirectWorkerConfig {
            hop_limit: settings.worker.max_redirects,
            take_timeout: settings.queue.take_timeout(),
            recheck_delay: settings.worker.recheck_delay(),
            sleep_on_fail: settings.worker.sleep_on_fail(),
            liveness_file,
        },
    );
    worker.run(shutdown.token()).await?;
    Ok(())
}

async fn run_pusher(settings: &Settings, shutdown: &Shutdown) -> anyhow::Result<()> {
    info!("Starting notification pusher...");
    init_metrics(settings.metrics.listen.as_deref());

    let output: Arc<dyn Tube> = Arc::new(
        RedisTube::connect(&settings.output_queue, settings.queue.lease())
            .await
            .context("failed to connect to the output queue")?,
    );
    let dispatcher = NotificationDispatcher::new(
        output,
        DispatcherConfig {
            pool_size: settings.pusher.pool_size,
            take_timeout: settings.queue.take_timeout(),
            http_timeout: settings.pusher.http_timeout(),
            sleep: settings.pusher.sleep(),
            sleep_on_fail: settings.pusher.sleep_on_fail(),
        },
    )?;
    dispatcher.run(shutdown.token()).await?;
    Ok(())
}
