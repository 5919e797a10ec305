//! Command-line arguments.

use std::time::Duration;

use clap::Parser;
use holoshare_core::{QoS, SessionConfig};

use crate::DemoError;

/// Run several replicating clients against one in-process broker.
#[derive(Debug, Parser)]
#[command(name = "holoshare-demo", version)]
pub struct Cli {
    /// Number of clients joining the session.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub clients: u16,

    /// Ticks to run before settling.
    #[arg(long, default_value_t = 50)]
    pub ticks: u64,

    /// Milliseconds between ticks.
    #[arg(long = "tick-ms", default_value_t = 100)]
    pub tick_ms: u64,

    /// Session topic.
    #[arg(long, env = "HOLOSHARE_TOPIC", default_value_t = SessionConfig::default().topic)]
    pub topic: String,

    /// Broker endpoint recorded in the session config.
    #[arg(long = "broker-url", env = "HOLOSHARE_BROKER", default_value_t = SessionConfig::default().broker_url)]
    pub broker_url: String,

    /// Delivery level: 0, 1 or 2.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: u8,

    /// Ask the broker to retain the last envelope.
    #[arg(long)]
    pub retain: bool,

    /// Broker keep-alive in seconds.
    #[arg(long = "keep-alive-secs", default_value_t = 60)]
    pub keep_alive_secs: u64,

    /// Hold messages in the broker until the start of the next tick.
    #[arg(long)]
    pub deferred: bool,

    /// Deliver every message twice.
    #[arg(long)]
    pub duplicate: bool,

    /// Seed for identities and simulated user activity.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Probability that some user edits the scene on a given tick.
    #[arg(long = "edit-chance", default_value_t = 0.3)]
    pub edit_chance: f64,

    /// Log filter directives, e.g. `info,holoshare_core=debug`.
    #[arg(long = "log-filter", env = "HOLOSHARE_LOG")]
    pub log_filter: Option<String>,
}

impl Cli {
    /// Session settings every client joins with.
    pub fn session_config(&self) -> Result<SessionConfig, DemoError> {
        let qos = QoS::from_level(self.qos).ok_or(DemoError::InvalidQos(self.qos))?;
        Ok(SessionConfig {
            topic: self.topic.clone(),
            broker_url: self.broker_url.clone(),
            qos,
            retain: self.retain,
            clean_session: true,
            keep_alive: Duration::from_secs(self.keep_alive_secs),
        })
    }

    /// Validated edit probability.
    pub fn edit_chance(&self) -> Result<f64, DemoError> {
        if (0.0..=1.0).contains(&self.edit_chance) {
            Ok(self.edit_chance)
        } else {
            Err(DemoError::InvalidEditChance(self.edit_chance))
        }
    }

    /// Period of the tick timer.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}
