//! Ground-station monitor client: entry point.
//!
//! Connects to a monitor device over WebRTC, runs the requested commands and
//! queries over its data channel, prints the results as JSON lines on stdout
//! and disconnects.  With `--watch` it keeps printing the device's
//! unsolicited messages until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! monitor-client [OPTIONS]
//!
//! Options:
//!   --host <HOST>              Device hostname or IP [default: 127.0.0.1]
//!   --port <PORT>              Device signaling port [default: 8080]
//!   --config <PATH>            Optional TOML config file
//!   --cmd <NAME>               Command to send (repeatable)
//!   --get <KEY>                Value to query (repeatable)
//!   --watch                    Stream unsolicited messages until Ctrl+C
//!   --connect-timeout <SECS>   Give up connecting after this long [default: 15]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                  | Default     | Description                  |
//! |---------------------------|-------------|------------------------------|
//! | `MONITOR_HOST`            | `127.0.0.1` | Device hostname or IP        |
//! | `MONITOR_PORT`            | `8080`      | Device signaling port        |
//! | `MONITOR_CONFIG`          | (none)      | TOML config file             |
//! | `MONITOR_CONNECT_TIMEOUT` | `15`        | Connect timeout (secs)       |
//! | `RUST_LOG`                | from config | `tracing` filter directive   |
//!
//! Command-line values win over environment variables, which win over the
//! config file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use monitor_client::application::{ClientError, MonitorClient, MonitorEvent};
use monitor_client::domain::{ClientConfig, SignalingEndpoint};
use monitor_client::infrastructure::config_file::{self, ConfigFile};
use monitor_client::infrastructure::webrtc_client;
use monitor_core::ConnectionStatus;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebRTC client for ground-station monitor devices.
#[derive(Debug, Parser)]
#[command(
    name = "monitor-client",
    about = "Connect to a monitor device over WebRTC and talk to it over its data channel",
    version
)]
struct Cli {
    /// Hostname or IP address of the monitor device.
    #[arg(long, env = "MONITOR_HOST")]
    host: Option<String>,

    /// Port of the device's HTTP signaling endpoint.
    #[arg(long, env = "MONITOR_PORT")]
    port: Option<u16>,

    /// Path to a TOML config file.
    #[arg(long, env = "MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// Command to send once connected, e.g. `start_monitor`.  Repeatable.
    #[arg(long = "cmd", value_name = "NAME")]
    cmds: Vec<String>,

    /// Value to query once connected, e.g. `status`.  Repeatable.
    #[arg(long = "get", value_name = "KEY")]
    gets: Vec<String>,

    /// Keep printing unsolicited device messages until Ctrl+C.
    #[arg(long)]
    watch: bool,

    /// Seconds to wait for the connection and data channel.
    #[arg(long, default_value_t = 15, env = "MONITOR_CONNECT_TIMEOUT")]
    connect_timeout: u64,
}

/// Everything a run needs, resolved from CLI, environment and config file.
#[derive(Debug)]
struct RunPlan {
    endpoint: SignalingEndpoint,
    client: ClientConfig,
    log_level: String,
    connect_timeout: Duration,
    cmds: Vec<String>,
    gets: Vec<String>,
    watch: bool,
}

impl Cli {
    /// Merges the CLI arguments with the optional config file.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` names a file that cannot be read or
    /// parsed.
    fn into_run_plan(self) -> anyhow::Result<RunPlan> {
        let file = match &self.config {
            Some(path) => config_file::load(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => ConfigFile::default(),
        };

        let host = self
            .host
            .or_else(|| file.connection.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = self.port.or(file.connection.port).unwrap_or(DEFAULT_PORT);

        Ok(RunPlan {
            endpoint: SignalingEndpoint::new(host, port),
            client: file.client_config(),
            log_level: file.logging.level,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            cmds: self.cmds,
            gets: self.gets,
            watch: self.watch,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let plan = cli.into_run_plan()?;

    // Logs go to stderr so stdout carries only results.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&plan.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("monitor client starting, device={}", plan.endpoint);

    let (client, mut events) =
        webrtc_client(plan.client.clone()).context("failed to build monitor client")?;
    client.connect_to(plan.endpoint.clone());

    let outcome = tokio::select! {
        outcome = run(&client, &mut events, &plan) => outcome,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("received Ctrl+C; disconnecting"),
                Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
            }
            Ok(())
        }
    };

    client.disconnect().await;
    info!("monitor client stopped");
    outcome
}

async fn run(
    client: &MonitorClient,
    events: &mut mpsc::UnboundedReceiver<MonitorEvent>,
    plan: &RunPlan,
) -> anyhow::Result<()> {
    tokio::time::timeout(plan.connect_timeout, wait_until_ready(events))
        .await
        .with_context(|| {
            format!(
                "no connection to {} within {}s",
                plan.endpoint,
                plan.connect_timeout.as_secs()
            )
        })??;
    info!("connected to {}", plan.endpoint);

    let mut failures = 0usize;
    for name in &plan.cmds {
        let outcome = match client.cmd(name) {
            Ok(response) => response.await,
            Err(e) => Err(e),
        };
        failures += report("cmd", name, outcome);
    }
    for key in &plan.gets {
        let outcome = match client.get(key) {
            Ok(response) => response.await,
            Err(e) => Err(e),
        };
        failures += report("get", key, outcome);
    }

    if plan.watch {
        watch(events).await;
    }

    if failures > 0 {
        bail!("{failures} request(s) failed");
    }
    Ok(())
}

/// Consumes events until the session is connected with an open channel.
async fn wait_until_ready(events: &mut mpsc::UnboundedReceiver<MonitorEvent>) -> anyhow::Result<()> {
    let mut connected = false;
    let mut channel_open = false;

    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::StatusChanged(status) => {
                info!("status: {status}");
                connected = status == ConnectionStatus::Connected;
            }
            MonitorEvent::DataChannelOpen => channel_open = true,
            MonitorEvent::DataChannelClose => channel_open = false,
            MonitorEvent::VideoReceived(stream) => {
                info!("video stream {} available", stream.stream_id);
            }
            MonitorEvent::MessageReceived(message) => print_message(&message),
            MonitorEvent::Error(ClientError::Negotiation(e)) => {
                return Err(e).context("negotiation failed");
            }
            MonitorEvent::Error(e) => warn!("{e}"),
        }
        if connected && channel_open {
            return Ok(());
        }
    }
    bail!("client event stream ended unexpectedly")
}

async fn watch(events: &mut mpsc::UnboundedReceiver<MonitorEvent>) {
    info!("watching device messages; press Ctrl+C to stop");
    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::MessageReceived(message) => print_message(&message),
            MonitorEvent::StatusChanged(ConnectionStatus::Disconnected) => {
                warn!("device disconnected");
                break;
            }
            MonitorEvent::DataChannelClose => {
                warn!("data channel closed");
                break;
            }
            MonitorEvent::Error(e) => warn!("{e}"),
            _ => {}
        }
    }
}

/// Prints one request result.  Returns `1` on failure so callers can count.
fn report(
    kind: &str,
    name: &str,
    outcome: Result<Value, monitor_client::RequestError>,
) -> usize {
    match outcome {
        Ok(payload) => {
            println!("{}", json!({ "kind": kind, "name": name, "result": payload }));
            0
        }
        Err(e) => {
            error!("{kind} {name} failed: {e}");
            println!("{}", json!({ "kind": kind, "name": name, "error": e.to_string() }));
            1
        }
    }
}

fn print_message(message: &Value) {
    println!("{}", json!({ "message": message }));
}

// ── Tests ─────────────────────────────────────────────────────────────────────
