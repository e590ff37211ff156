//! Daemon orchestration -- assembly, engine wiring, and lifecycle management.
//!
//! The [`Orchestrator`] loads configuration, installs the metrics recorder,
//! builds the audit log processor, amends the inspection engine's
//! configuration with the audit-output directives, and drives the
//! processor through startup and graceful shutdown.
//!
//! # Shutdown
//!
//! On `SIGTERM`/`SIGINT` the processor is asked to stop and given
//! `general.shutdown_timeout` to finish its in-flight ticks. If the deadline
//! passes, [`Orchestrator::shutdown`] returns an error and the binary exits
//! non-zero.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use wafaudit_core::config::WafAuditConfig;
use wafaudit_core::error::WafAuditError;
use wafaudit_log_processor::{
    AuditLogLock, DirectiveSet, LogProcessor, LogProcessorBuilder, ProcessorConfig,
    ProcessorState,
};

use crate::metrics_server;

/// How often the uptime gauge is refreshed.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(15);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: WafAuditConfig,
    /// The audit log processor.
    processor: LogProcessor,
    /// Inspection engine configuration with audit directives applied.
    engine_config: DirectiveSet,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read, parsed,
    /// or validated, or if the processor cannot be built.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = WafAuditConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: WafAuditConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let processor = LogProcessorBuilder::new()
            .config(ProcessorConfig::from_core(&config.audit_log))
            .build()
            .map_err(WafAuditError::from)
            .map_err(|e| anyhow::anyhow!("failed to build audit log processor: {}", e))?;

        let engine_config = processor.apply_audit_directives(DirectiveSet::new());
        tracing::info!(
            path = %processor.live_path().display(),
            directives = engine_config.lines().len(),
            "audit output directives applied to engine configuration"
        );

        let (shutdown_tx, _) = broadcast::channel(4);

        Ok(Self {
            config,
            processor,
            engine_config,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start both periodic jobs and the uptime updater.
    pub fn start(&mut self) -> Result<()> {
        self.processor
            .start_processing_job()
            .map_err(WafAuditError::from)?;
        self.processor
            .start_expiration_job()
            .map_err(WafAuditError::from)?;

        if self.config.metrics.enabled {
            spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe());
        }

        tracing::info!(
            path = %self.processor.live_path().display(),
            state = %self.processor.state(),
            "audit log processor started"
        );
        Ok(())
    }

    /// Start, wait for a shutdown signal, then shut down gracefully.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        self.start()?;

        tracing::info!("entering main loop");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await
    }

    /// Stop the processor within `general.shutdown_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the jobs did not confirm completion before the
    /// deadline. The jobs keep finishing their current tick in the background.
    pub async fn shutdown(&mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(());

        let deadline = self.config.general.shutdown_timeout;
        tracing::info!(deadline = ?deadline, "stopping audit log processor");

        self.processor
            .stop(deadline)
            .await
            .map_err(WafAuditError::from)?;
        Ok(())
    }

    /// Inspection engine configuration with the audit directives applied.
    pub fn engine_config(&self) -> &DirectiveSet {
        &self.engine_config
    }

    /// Lock handle to be shared with the request-handling path.
    pub fn audit_log_lock(&self) -> AuditLogLock {
        self.processor.lock()
    }

    /// Current processor state.
    pub fn processor_state(&self) -> ProcessorState {
        self.processor.state()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &WafAuditConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
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

/// Spawn a background task that periodically updates the uptime gauge.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use wafaudit_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs_f64());
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
