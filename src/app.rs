use crate::config::Config;
use crate::data::DbContext;
use crate::state::AppState;
use crate::sync::scheduler::{RefreshScheduler, log_run_result};
use crate::sync::{JobSettings, RefreshJob};
use crate::upstream::UpstreamClient;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use sqlx::ConnectOptions;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
}

impl App {
    /// Connect to the database, run migrations, and wire the refresh job.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let slow_threshold = Duration::from_millis(500);

        let connect_options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_slow_threshold(slow_threshold)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            max_connections = 4,
            acquire_timeout = "4s",
            acquire_slow_threshold = fmt_duration(slow_threshold),
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let upstream = Arc::new(
            UpstreamClient::new(&config.upstream_base_url, &config.rate_limiting())
                .context("Failed to create upstream client")?,
        );
        let db = Arc::new(DbContext::new(db_pool));

        let job = Arc::new(RefreshJob::new(
            JobSettings::from_config(&config),
            upstream.clone(),
            upstream,
            db.clone(),
            db.clone(),
        ));

        info!(
            job = job.job_name(),
            regions = config.regions.len(),
            batch_size = config.batch_size.get(),
            max_concurrent_fetches = config.max_concurrent_fetches.get(),
            fetch_timeout = fmt_duration(config.fetch_timeout),
            refresh_period = ?config.refresh_period,
            cursor_policy = ?config.cursor_policy,
            "refresh job configured"
        );

        let app_state = AppState::new(job, db.clone(), db);
        Ok(Self { config, app_state })
    }

    /// Serve the HTTP trigger until SIGINT/SIGTERM, running the scheduler
    /// alongside it when an interval is configured.
    pub async fn serve(self) -> ExitCode {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let scheduler_handle = self.config.schedule_interval.map(|interval| {
            let scheduler = RefreshScheduler::new(
                self.app_state.job.clone(),
                interval,
                self.config.shutdown_timeout,
            );
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move { scheduler.run(shutdown_rx).await })
        });

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = ?e, %addr, "Failed to bind web server");
                return ExitCode::FAILURE;
            }
        };
        info!(%addr, "web server listening");

        let router = create_router(self.app_state.clone());
        let mut web_shutdown_rx = shutdown_tx.subscribe();
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = web_shutdown_rx.recv().await;
        });
        let mut server_handle = tokio::spawn(async move { server.await });

        let mut exit_code = ExitCode::SUCCESS;
        tokio::select! {
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
            }
            result = &mut server_handle => {
                error!(result = ?result, "Web server exited unexpectedly");
                exit_code = ExitCode::FAILURE;
            }
        }

        let _ = shutdown_tx.send(());

        let grace = self.config.shutdown_timeout + Duration::from_secs(2);
        if !server_handle.is_finished()
            && tokio::time::timeout(grace, &mut server_handle).await.is_err()
        {
            warn!(timeout = fmt_duration(grace), "Web server did not stop in time");
            exit_code = ExitCode::FAILURE;
        }
        if let Some(handle) = scheduler_handle
            && tokio::time::timeout(grace, handle).await.is_err()
        {
            warn!(timeout = fmt_duration(grace), "Scheduler did not stop in time");
            exit_code = ExitCode::FAILURE;
        }

        info!("Shutdown complete");
        exit_code
    }

    /// Run one refresh invocation. Denied and failed runs exit non-zero.
    pub async fn run_once(self) -> ExitCode {
        let result = self.app_state.job.trigger().await;
        log_run_result(&result);
        match result {
            Ok(_) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
