use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use pac_core::config::PacConfig;
use pac_daemon::cli::DaemonCli;
use pac_daemon::server::{self, AppState};
use pac_daemon::{logging, metrics_server};
use pac_mutation::{
    DsnCache, KubeApiClient, Mutator, MutatorSettings, PolicyLoader, SystemResolver,
    TemplateEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = PacConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }

    logging::init_tracing(&config.general)?;

    let policy = PolicyLoader::load(&config.mutation.policy_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load mutation policy: {}", e))?;

    if cli.validate {
        tracing::info!(
            config = %cli.config.display(),
            policy = %config.mutation.policy_path,
            rules = policy.rules.len(),
            "configuration is valid"
        );
        return Ok(());
    }

    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        return Err(anyhow::anyhow!("failed to install crypto provider: {:?}", e));
    }

    let kube = Arc::new(
        KubeApiClient::try_default()
            .await
            .map_err(|e| anyhow::anyhow!("failed to create kubernetes client: {}", e))?,
    );
    let dsn_cache = DsnCache::new(config.sentry.dsn_cache.clone());
    let engine = TemplateEngine::new(dsn_cache, Arc::new(SystemResolver));
    let mutator = Mutator::new(
        Arc::new(policy),
        Arc::new(engine),
        kube,
        MutatorSettings::from(&config.mutation),
    );

    if let Some(target) = cli.test_pod_target() {
        let (namespace, pod) = target?;
        let ops = mutator
            .test_pod(namespace, pod)
            .await
            .map_err(|e| anyhow::anyhow!("failed to mutate pod {}/{}: {}", namespace, pod, e))?;
        tokio::fs::write(&cli.output, serde_json::to_vec_pretty(&ops)?).await?;
        tracing::info!(
            output = %cli.output.display(),
            operations = ops.len(),
            "patch written"
        );
        return Ok(());
    }

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    tracing::info!("pac-daemon starting");

    let state = AppState {
        mutator: Arc::new(mutator),
        request_timeout: config.server.request_timeout(),
    };
    server::serve(&config.server, state, async {
        match wait_for_shutdown_signal().await {
            Ok(signal) => tracing::info!(signal = signal, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "signal handler failed, shutting down"),
        }
    })
    .await?;

    tracing::info!("pac-daemon shut down");
    Ok(())
}

/// Wait for SIGTERM or SIGINT and return the signal name.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
