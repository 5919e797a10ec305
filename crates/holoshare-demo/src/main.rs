//! Holoshare demo.
//!
//! Joins several clients to one in-process broker, lets simulated users edit
//! the shared scene on a timer, then checks that every client ended up with
//! the same scene.

mod activity;
mod cli;

use clap::Parser;
use holoshare_core::{ActionError, ConnectionError, ReplicaError, TickReport};
use holoshare_harness::{Delivery, MemoryBroker, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

const SETTLE_ROUNDS: usize = 32;

/// Demo failures.
#[derive(Debug, Error)]
pub enum DemoError {
    /// The log filter did not parse.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber was already installed.
    #[error("failed to install logger: {0}")]
    Logging(String),

    /// QoS level outside 0..=2.
    #[error("invalid qos level {0}")]
    InvalidQos(u8),

    /// Edit probability outside 0..=1.
    #[error("edit chance {0} is not a probability")]
    InvalidEditChance(f64),

    /// A client could not join.
    #[error(transparent)]
    Connect(#[from] ConnectionError),

    /// A simulated user produced an invalid edit.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// A simulated spawn collided with an existing id.
    #[error(transparent)]
    Replica(#[from] ReplicaError),

    /// Traffic was still flowing after the settle limit.
    #[error("scene did not settle within {0} rounds")]
    Unsettled(usize),
}

fn init_logging(directives: Option<&str>) -> Result<(), DemoError> {
    let filter = match directives {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| DemoError::Logging(err.to_string()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), DemoError> {
    let cli = Cli::parse();
    init_logging(cli.log_filter.as_deref())?;

    let config = cli.session_config()?;
    let edit_chance = cli.edit_chance()?;
    let delivery = if cli.deferred { Delivery::Deferred } else { Delivery::Immediate };
    info!(
        clients = cli.clients,
        topic = %config.topic,
        broker = %config.broker_url,
        qos = ?config.qos,
        ?delivery,
        "starting session"
    );

    let broker = MemoryBroker::with_delivery(delivery);
    broker.duplicate_deliveries(cli.duplicate);
    let mut world = World::with_config(broker, config, cli.seed);
    for index in 0..cli.clients {
        world.add_client(&format!("user-{index}"))?;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let mut ticker = tokio::time::interval(cli.tick_interval());
    let mut totals = TickReport::default();

    for tick in 0..cli.ticks {
        ticker.tick().await;
        world.broker().flush();

        if rng.gen_bool(edit_chance) {
            let user = rng.gen_range(0..world.len());
            activity::act(&mut world, user, &mut rng)?;
        }

        for report in world.tick_all() {
            totals += report;
        }
        world.env().advance(1);
        debug!(tick, in_flight = world.broker().in_flight(), "tick done");
    }

    let rounds = world.settle(SETTLE_ROUNDS).ok_or(DemoError::Unsettled(SETTLE_ROUNDS))?;
    let converged = world.converged();
    for client in world.clients() {
        info!(user = client.name(), objects = client.ids().len(), "final scene");
    }
    info!(
        rounds,
        converged,
        published = world.broker().published(),
        delivered = world.broker().delivered(),
        applied = totals.applied(),
        duplicate_creates = totals.duplicate_creates,
        "session finished"
    );
    if !converged {
        warn!("clients ended with different scenes");
    }
    Ok(())
}
