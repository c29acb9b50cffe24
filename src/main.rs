//! CLI entry point for crash-sentinel.
//!
//! Provides a command-line interface for:
//! - Monitoring a real device over the configured serial transport (`run`)
//! - Exercising the full pipeline against a simulated device (`simulate`)
//!
//! The notification transport (a cellular modem or platform messaging
//! service) is an external collaborator; this binary wires the loopback mock
//! gateway so the pipeline is observable end to end without one.
//!
//! # Usage
//!
//! Monitor a device:
//! ```bash
//! crash-sentinel run --port /dev/ttyUSB0
//! ```
//!
//! Simulate an impact:
//! ```bash
//! crash-sentinel simulate --scenario impact --frames 30
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crash_sentinel::classifier::{Classifier, ThresholdRule};
use crash_sentinel::config::SentinelConfig;
use crash_sentinel::gateway::MockGateway;
use crash_sentinel::guard::AlertGuard;
use crash_sentinel::logging;
use crash_sentinel::notify::{BatchEvent, Dispatcher};
use crash_sentinel::orchestrator::{Orchestrator, SentinelEvent};
use crash_sentinel::providers::{StaticLocation, StaticRecipients};
use crash_sentinel::sim::{self, Scenario, Simulation};
use crash_sentinel::transport::{self, DynTransport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "crash-sentinel")]
#[command(about = "Accident-detection telemetry monitor", long_about = None)]
struct Cli {
    /// Path to the configuration file (default: config/sentinel.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor a device over the serial transport
    Run {
        /// Serial port override (e.g. /dev/ttyUSB0, COM3)
        #[arg(long)]
        port: Option<String>,

        /// Baud rate override
        #[arg(long)]
        baud: Option<u32>,
    },

    /// Run the pipeline against a simulated device
    Simulate {
        /// What the simulated device does
        #[arg(long, value_enum, default_value_t = SimScenario::Impact)]
        scenario: SimScenario,

        /// Total telemetry frames to emit
        #[arg(long, default_value_t = 25)]
        frames: u32,

        /// Delay between frames in milliseconds
        #[arg(long, default_value_t = 200)]
        interval_ms: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SimScenario {
    /// Baseline telemetry only
    Quiet,
    /// Over-threshold impact burst mid-stream
    Impact,
    /// Explicit distress token mid-stream
    Distress,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SentinelConfig::load_from(path)?,
        None => SentinelConfig::load()?,
    };
    config
        .validate()
        .map_err(crash_sentinel::error::SentinelError::Configuration)?;
    logging::init_from_config(&config).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Run { port, baud } => {
            let port = port.unwrap_or_else(|| config.transport.port.clone());
            let baud = baud.unwrap_or(config.transport.baud_rate);
            info!(%port, baud, "Opening telemetry transport");
            let transport = transport::open_serial(&port, baud)?;
            run_pipeline(&config, transport).await
        }
        Commands::Simulate {
            scenario,
            frames,
            interval_ms,
        } => {
            let simulation = Simulation {
                scenario: match scenario {
                    SimScenario::Quiet => Scenario::Quiet,
                    SimScenario::Impact => Scenario::Impact {
                        after_frames: frames / 2,
                    },
                    SimScenario::Distress => Scenario::Distress {
                        after_frames: frames / 2,
                    },
                },
                frames,
                interval: Duration::from_millis(interval_ms),
            };
            info!(?simulation, "Starting simulated device");
            run_pipeline(&config, sim::simulated_transport(simulation)).await
        }
    }
}

async fn run_pipeline(config: &SentinelConfig, transport: DynTransport) -> Result<()> {
    let classifier = Arc::new(Classifier::new(
        config.detection.model_path.as_deref(),
        ThresholdRule::new(
            config.detection.accel_threshold,
            config.detection.gyro_threshold,
        ),
    ));
    let guard = Arc::new(AlertGuard::new(config.alert.cooldown));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(MockGateway::auto())));
    let recipients = Arc::new(StaticRecipients::new(config.recipients.clone()));
    let location = Arc::new(StaticLocation::default());

    if config.recipients.is_empty() {
        warn!("No emergency recipients configured; alerts will fail to dispatch");
    }

    let orchestrator = Arc::new(
        Orchestrator::new(classifier, guard, dispatcher, recipients, location)
            .with_alert_probability(config.detection.alert_probability),
    );

    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            report_event(&event);
        }
    });

    tokio::select! {
        result = orchestrator.run(transport) => result.map_err(Into::into),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    }
}

/// Render pipeline events for the terminal observer.
fn report_event(event: &SentinelEvent) {
    match event {
        SentinelEvent::Frame { accel, gyro } => {
            tracing::trace!(?accel, ?gyro, "Sample");
        }
        SentinelEvent::DecodeError { field, raw } => {
            warn!(field, raw, "Malformed telemetry field");
        }
        SentinelEvent::Detection {
            probability,
            source,
        } => {
            tracing::debug!(probability, ?source, "Classification");
        }
        SentinelEvent::Distress => info!("Distress signal received"),
        SentinelEvent::AlertTriggered { manual } => {
            info!(manual, "Emergency alert triggered");
        }
        SentinelEvent::AlertSuppressed => {
            info!("Duplicate alert suppressed by guard");
        }
        SentinelEvent::Guard(status) => {
            if status.sent {
                info!(remaining_secs = status.remaining.as_secs(), "Alert sent; guard armed");
            } else {
                info!("Ready to send alerts");
            }
        }
        SentinelEvent::Batch(BatchEvent::AllSent { total, sent }) => {
            info!("Sent {sent} of {total} messages");
        }
        SentinelEvent::Batch(BatchEvent::AllDelivered { total, delivered }) => {
            info!("Delivered {delivered} of {total} messages");
        }
        SentinelEvent::Batch(BatchEvent::Error(message)) => {
            warn!(%message, "Dispatch error");
        }
        SentinelEvent::Batch(BatchEvent::Cancelled) => {
            info!("Emergency alert cancelled");
        }
        SentinelEvent::TransportClosed => info!("Telemetry stream closed"),
        SentinelEvent::TransportError(message) => {
            warn!(%message, "Telemetry transport failed");
        }
    }
}
