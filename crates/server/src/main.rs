mod bootstrap;
mod health;
mod http_ingress;
mod zendesk;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use docbot_core::config::{AppConfig, LoadOptions, SlackMode};
use docbot_slack::signature::SignatureVerifier;
use docbot_slack::socket::{ReconnectPolicy, SocketModeRunner, WebSocketTransport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::bootstrap::Application;
use crate::health::HealthState;
use crate::http_ingress::IngressState;

fn init_logging(config: &AppConfig) {
    use docbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging needs the loaded config, so bootstrap reuses it.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatches = TaskTracker::new();
    let server = spawn_http(&app, shutdown_rx.clone(), dispatches.clone()).await?;

    let mut runner = match app.config.slack.mode {
        SlackMode::Socket => Some(spawn_socket_mode(&app, shutdown_rx)),
        SlackMode::Http => None,
    };

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        slack_mode = app.config.slack.mode.as_str(),
        docs_backend = app.config.docs.backend.as_str(),
        "docbot-server started"
    );

    let runner_stopped = tokio::select! {
        signal = wait_for_shutdown() => {
            signal?;
            false
        }
        outcome = wait_for_runner(&mut runner) => {
            error!(
                event_name = "system.server.socket_mode_stopped",
                correlation_id = "shutdown",
                outcome = %outcome,
                "socket mode runner stopped; shutting down"
            );
            true
        }
    };
    if runner_stopped {
        runner = None;
    }

    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "docbot-server stopping");
    let _ = shutdown_tx.send(true);
    dispatches.close();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let deadline = Instant::now() + grace;

    if let Some(mut handle) = runner {
        if timeout_at(deadline, &mut handle).await.is_err() {
            warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "socket mode dispatches still running after the grace period; aborting"
            );
            handle.abort();
        }
    }
    if timeout_at(deadline, server).await.is_err() {
        warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "http server did not stop within the grace period"
        );
    }
    if timeout_at(deadline, dispatches.wait()).await.is_err() {
        warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            pending = dispatches.len(),
            "slack request dispatches still running after the grace period"
        );
    }

    app.retriever.close().await;
    info!(event_name = "system.server.stopped", correlation_id = "shutdown", "docbot-server stopped");
    Ok(())
}

/// Health always; the signed Slack routes only in HTTP mode.
async fn spawn_http(
    app: &Application,
    mut shutdown: watch::Receiver<bool>,
    dispatches: TaskTracker,
) -> Result<JoinHandle<()>> {
    let mut router: Router = health::router(HealthState {
        retriever: app.retriever.clone(),
        llm_configured: app.assistant.llm_enabled(),
        ticketing_configured: app.tickets.is_some(),
    });

    if app.config.slack.mode == SlackMode::Http {
        let signing_secret = app
            .config
            .slack
            .signing_secret
            .clone()
            .context("slack.signing_secret is required in http mode")?;
        router = router.merge(http_ingress::router(IngressState {
            verifier: SignatureVerifier::new(signing_secret),
            dispatcher: app.dispatcher.clone(),
            dispatches,
        }));
    }

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(
        event_name = "system.http.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "http listener started"
    );

    Ok(tokio::spawn(async move {
        let stop = async move {
            let _ = shutdown.wait_for(|stopping| *stopping).await;
        };
        if let Err(error) = axum::serve(listener, router).with_graceful_shutdown(stop).await {
            error!(
                event_name = "system.http.error",
                correlation_id = "bootstrap",
                error = %error,
                "http server terminated unexpectedly"
            );
        }
    }))
}

fn spawn_socket_mode(app: &Application, shutdown: watch::Receiver<bool>) -> JoinHandle<Result<()>> {
    let transport =
        WebSocketTransport::new(app.slack.clone(), app.config.slack.app_token.clone());
    let runner = SocketModeRunner::new(
        Arc::new(transport),
        app.dispatcher.clone(),
        ReconnectPolicy::default(),
    );
    tokio::spawn(async move { runner.start(shutdown).await })
}

async fn wait_for_runner(runner: &mut Option<JoinHandle<Result<()>>>) -> String {
    match runner {
        Some(handle) => match handle.await {
            Ok(Ok(())) => "completed".to_owned(),
            Ok(Err(error)) => error.to_string(),
            Err(error) => error.to_string(),
        },
        None => std::future::pending().await,
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
