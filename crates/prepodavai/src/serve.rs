// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `prepodavai serve` and `prepodavai worker` command implementations.
//!
//! `serve` runs the REST API and, when `queue.embedded_workers` is set, the
//! worker pool and stale-request sweeper in the same process. `worker` runs
//! only the pool and sweeper. Both share one SQLite database and shut down
//! on SIGINT/SIGTERM: stop claiming, drain in-flight jobs, close the browser,
//! checkpoint the database.

use std::sync::Arc;
use std::time::Duration;

use prepodavai_config::PrepodavaiConfig;
use prepodavai_core::{DeliveryChannel, DocumentRenderer, GenerationProvider, PrepodavaiError};
use prepodavai_credits::CostTable;
use prepodavai_delivery::DeliveryDispatcher;
use prepodavai_gateway::{AuthConfig, GatewayState, HealthState, start_server};
use prepodavai_generation::GenerationStore;
use prepodavai_render::{PdfRenderer, RenderEngine};
use prepodavai_storage::Database;
use prepodavai_worker::{
    GenerationJobHandler, HttpProvider, JobQueue, StaleSweeper, WorkerPool,
    install_signal_handler,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[cfg(feature = "telegram")]
use prepodavai_telegram::TelegramChannel;

/// Open the database and write configured cost overrides.
pub async fn open_database(config: &PrepodavaiConfig) -> Result<Database, PrepodavaiError> {
    let db = Database::open_with(&config.storage).await?;
    let applied = CostTable::new(db.clone())
        .apply_overrides(&config.credits.cost_overrides)
        .await?;
    if applied > 0 {
        info!(applied, "credit cost overrides applied");
    }
    Ok(db)
}

/// The processing side of the pipeline: worker pool plus the browser it may own.
struct Workers {
    pool: WorkerPool,
    engine: Option<Arc<RenderEngine>>,
}

#[cfg(feature = "telegram")]
fn delivery_channel(config: &PrepodavaiConfig) -> Result<Option<Arc<dyn DeliveryChannel>>, PrepodavaiError> {
    if config.telegram.bot_token.is_none() {
        info!("telegram delivery skipped (no bot_token configured)");
        return Ok(None);
    }
    let telegram = TelegramChannel::new(&config.telegram).map_err(|e| {
        error!(error = %e, "failed to initialize Telegram channel");
        e
    })?;
    info!("telegram delivery enabled");
    Ok(Some(Arc::new(telegram)))
}

#[cfg(not(feature = "telegram"))]
fn delivery_channel(_config: &PrepodavaiConfig) -> Result<Option<Arc<dyn DeliveryChannel>>, PrepodavaiError> {
    info!("telegram delivery disabled (telegram feature not enabled)");
    Ok(None)
}

/// Build the worker pool. `None` when no provider endpoint is configured.
fn build_workers(config: &PrepodavaiConfig, db: &Database) -> Result<Option<Workers>, PrepodavaiError> {
    if config.provider.endpoint_url.is_none() {
        return Ok(None);
    }
    let provider: Arc<dyn GenerationProvider> = Arc::new(HttpProvider::new(&config.provider)?);
    let channel = delivery_channel(config)?;

    let engine = config
        .render
        .enabled
        .then(|| Arc::new(RenderEngine::new(config.render.clone())));
    let renderer = engine
        .as_ref()
        .map(|engine| Arc::new(PdfRenderer::new(Arc::clone(engine))) as Arc<dyn DocumentRenderer>);
    if renderer.is_none() {
        info!("PDF rendering disabled, text results are sent as messages");
    }

    let dispatcher = Arc::new(DeliveryDispatcher::new(db.clone(), channel, renderer));
    let handler = Arc::new(GenerationJobHandler::new(
        GenerationStore::new(db.clone()),
        provider,
        dispatcher,
        Duration::from_secs(config.queue.provider_timeout_secs),
    ));
    let queue = JobQueue::new(db.clone(), config.queue.clone());
    Ok(Some(Workers {
        pool: WorkerPool::new(queue, handler),
        engine,
    }))
}

/// Background processing tasks of one process.
struct Background {
    pool: Option<JoinHandle<Result<(), PrepodavaiError>>>,
    sweeper: JoinHandle<()>,
    engine: Option<Arc<RenderEngine>>,
}

impl Background {
    fn spawn(
        config: &PrepodavaiConfig,
        db: &Database,
        workers: Option<Workers>,
        cancel: &CancellationToken,
    ) -> Self {
        let sweeper = StaleSweeper::new(db.clone(), config.sweeper.clone());
        let sweeper_cancel = cancel.clone();
        let sweeper = tokio::spawn(async move { sweeper.run(sweeper_cancel).await });

        let (pool, engine) = match workers {
            Some(Workers { pool, engine }) => {
                let pool_cancel = cancel.clone();
                (Some(tokio::spawn(async move { pool.run(pool_cancel).await })), engine)
            }
            None => (None, None),
        };
        Self {
            pool,
            sweeper,
            engine,
        }
    }

    /// Wait for the tasks to observe cancellation, then release the browser.
    async fn join(self) {
        if let Some(pool) = self.pool {
            match pool.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "worker pool failed"),
                Err(e) => error!(error = %e, "worker pool task panicked"),
            }
        }
        if let Err(e) = self.sweeper.await {
            error!(error = %e, "sweeper task panicked");
        }
        if let Some(engine) = self.engine
            && let Err(e) = engine.shutdown().await
        {
            warn!(error = %e, "render engine shutdown failed");
        }
    }
}

#[cfg(feature = "prometheus")]
fn prometheus_render(config: &PrepodavaiConfig) -> Option<Arc<dyn Fn() -> String + Send + Sync>> {
    if !config.prometheus.enabled {
        debug!("prometheus metrics disabled by configuration");
        return None;
    }
    match prepodavai_prometheus::PrometheusAdapter::new() {
        Ok(adapter) => {
            info!("prometheus metrics enabled");
            let handle = adapter.handle().clone();
            Some(Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>)
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    }
}

#[cfg(not(feature = "prometheus"))]
fn prometheus_render(_config: &PrepodavaiConfig) -> Option<Arc<dyn Fn() -> String + Send + Sync>> {
    None
}

/// Runs the `prepodavai serve` command.
pub async fn run_serve(config: PrepodavaiConfig) -> Result<(), PrepodavaiError> {
    init_tracing(&config.server.log_level);
    info!("starting prepodavai serve");

    let db = open_database(&config).await?;
    let render = prometheus_render(&config);

    let workers = if config.queue.embedded_workers {
        let workers = build_workers(&config, &db)?;
        if workers.is_none() {
            warn!("provider.endpoint_url not set, requests will stay pending until a worker runs");
        }
        workers
    } else {
        info!("embedded workers disabled, run `prepodavai worker` separately");
        None
    };

    let cancel = install_signal_handler();
    let background = Background::spawn(&config, &db, workers, &cancel);

    let state = GatewayState::new(
        db.clone(),
        config.queue.max_attempts,
        AuthConfig::from_config(&config),
        HealthState::new(render),
    );
    let served = start_server(&config.server, state, cancel.clone()).await;
    // A bind failure must still stop the background tasks.
    cancel.cancel();

    background.join().await;
    db.close().await?;
    served?;

    info!("prepodavai serve shutdown complete");
    Ok(())
}

/// Runs the `prepodavai worker` command.
pub async fn run_worker(config: PrepodavaiConfig) -> Result<(), PrepodavaiError> {
    init_tracing(&config.server.log_level);
    info!("starting prepodavai worker");

    let db = open_database(&config).await?;
    let workers = build_workers(&config, &db)?.ok_or_else(|| {
        PrepodavaiError::Config("provider.endpoint_url is required to run a worker".into())
    })?;

    let cancel = install_signal_handler();
    let background = Background::spawn(&config, &db, Some(workers), &cancel);
    cancel.cancelled().await;

    background.join().await;
    db.close().await?;
    info!("prepodavai worker shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("prepodavai={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use prepodavai_core::GenerationType;

    fn config_for(dir: &std::path::Path, extra: &str) -> PrepodavaiConfig {
        let toml = format!(
            "[storage]\ndatabase_path = \"{}\"\n{extra}",
            dir.join("p.db").display()
        );
        prepodavai_config::load_and_validate_str(&toml).unwrap()
    }

    #[tokio::test]
    async fn open_database_applies_cost_overrides() {
        let dir = tempfile_dir();
        let config = config_for(dir.path(), "[credits.cost_overrides]\nquiz = 6\n");
        let db = open_database(&config).await.unwrap();
        assert_eq!(
            CostTable::new(db.clone())
                .cost(GenerationType::Quiz)
                .await
                .unwrap(),
            6
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn no_provider_means_no_workers() {
        let dir = tempfile_dir();
        let config = config_for(dir.path(), "");
        let db = open_database(&config).await.unwrap();
        assert!(build_workers(&config, &db).unwrap().is_none());
    }

    #[tokio::test]
    async fn workers_are_built_with_a_provider() {
        let dir = tempfile_dir();
        let config = config_for(
            dir.path(),
            "[provider]\nendpoint_url = \"http://127.0.0.1:9/generate\"\n[render]\nenabled = false\n",
        );
        let db = open_database(&config).await.unwrap();
        let workers = build_workers(&config, &db).unwrap().unwrap();
        assert!(workers.engine.is_none());
    }

    fn tempfile_dir() -> tempfile::TempDir {
        tempfile::TempDir::new().unwrap()
    }
}
