//! Lucky Raffle node
//!
//! `serve` runs the raffle with its HTTP API, keeper and local oracle relay.
//! `simulate` plays a number of rounds in-process on a simulated clock.
//! `init-config` writes a sample configuration file.

use clap::{Parser, Subcommand};
use lucky_raffle::{
    api::{ApiServer, AppState},
    config::{generate_sample_config, ConfigLoader, NodeConfig},
    errors::AppResult,
    node::LocalNode,
    oracle::VrfEngine,
    raffle::RaffleEvent,
    service::{Clock, ManualClock, SystemClock},
    storage::SnapshotStore,
    types::Address,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "lucky-raffle")]
#[command(about = "Timed raffle settled by verifiable randomness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the raffle node with its HTTP API
    Serve {
        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<String>,

        /// Override the API port
        #[arg(long)]
        port: Option<u16>,

        /// Snapshot file: restored on start, written on shutdown
        #[arg(long)]
        state: Option<String>,

        /// Short interval and fast blocks, for local experiments
        #[arg(long)]
        fast: bool,
    },
    /// Play rounds in-process on a simulated clock
    Simulate {
        #[arg(long, default_value = "4")]
        players: usize,

        #[arg(long, default_value = "3")]
        rounds: u64,

        /// Seeds player payments and the oracle key
        #[arg(long, default_value = "7")]
        seed: u64,
    },
    /// Write a sample configuration file
    InitConfig { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lucky_raffle=info,tower_http=info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Serve {
            config,
            port,
            state,
            fast,
        } => serve(config, port, state, fast).await,
        Command::Simulate {
            players,
            rounds,
            seed,
        } => Ok(simulate(players, rounds, seed).await?),
        Command::InitConfig { path } => {
            generate_sample_config(&path)?;
            println!("Sample configuration written to {}", path);
            Ok(())
        }
    }
}

async fn serve(
    config_path: Option<String>,
    port: Option<u16>,
    state_path: Option<String>,
    fast: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match (&config_path, fast) {
        (Some(path), _) => ConfigLoader::new().with_path(path).load()?,
        (None, true) => NodeConfig::fast_local(),
        (None, false) => ConfigLoader::new().load()?,
    };
    if let Some(port) = port {
        config.api.port = port;
    }

    let store = state_path.map(SnapshotStore::new);
    let restored = match &store {
        Some(store) => store.load()?,
        None => None,
    };

    let node = LocalNode::build(&config, restored, Arc::new(SystemClock), VrfEngine::new_random())?;
    let tasks = node.spawn_tasks(&config);

    let mut events = node.service.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let RaffleEvent::WinnerPicked { winner, payout, round } = event {
                info!(round, winner = %winner, payout = %payout, "Round settled");
            }
        }
    });

    let state = Arc::new(AppState::new(node.service.clone(), node.coordinator.clone()));
    let result = ApiServer::new(config.api.clone(), state).run().await;

    tasks.stop();
    if let Some(store) = &store {
        if let Err(e) = store.save(&node.service.export().await) {
            warn!(error = %e, "Failed to save raffle snapshot");
        }
    }
    result
}

async fn simulate(players: usize, rounds: u64, seed: u64) -> AppResult<()> {
    let config = NodeConfig::fast_local();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let node = LocalNode::build(&config, None, clock.clone(), VrfEngine::from_seed(seed))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let fee = config.raffle.entrance_fee;

    for _ in 0..rounds {
        for i in 0..players {
            let player = Address::derive(&format!("player-{}", i));
            let paid = fee + rng.gen_range(0..=fee / 2);
            node.service.enter(player, paid).await?;
        }

        clock.advance(config.raffle.interval_secs);
        let request_id = match node.service.perform_upkeep().await? {
            RaffleEvent::RequestedRaffleWinner { request_id, .. } => request_id,
            other => {
                warn!(?other, "Unexpected event from settlement trigger");
                continue;
            }
        };

        for _ in 0..config.raffle.oracle.request_confirmations {
            node.coordinator.advance_block();
        }
        let fulfillment = node.coordinator.prepare_fulfillment(request_id)?;
        let settlement = node
            .service
            .fulfill_random_words(&node.coordinator.address(), request_id, &fulfillment.random_words)
            .await?;
        node.coordinator.mark_fulfilled(request_id)?;

        println!(
            "round {:>3}  winner #{} {}  payout {} wei  at {}",
            settlement.round,
            settlement.winner_index,
            settlement.winner,
            settlement.payout,
            clock.now(),
        );
    }

    println!(
        "{} rounds, {} entries, {} wei paid out",
        node.service.metrics().settlements(),
        node.service.metrics().entries(),
        node.treasury.total_paid()
    );
    Ok(())
}
