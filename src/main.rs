mod net;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rapier3d::prelude::*;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pursuit_server::dispatch::Dispatcher;
use pursuit_server::{SimConfig, SimEvent, SimWorld, VehicleRole};

use crate::net::start_websocket_server;
use crate::state::{ServerMessage, SharedGameState};

#[derive(Debug, Parser)]
#[command(name = "pursuit-server", about = "Fixed-step vehicle pursuit simulation over websockets")]
struct Args {
    /// JSON config; built-in presets when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "0.0.0.0:9001")]
    bind: String,

    /// Seeds dispatch bearings and every pursuer's avoidance choices.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Drive alone: no initial police and no dispatch.
    #[arg(long)]
    no_police: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SimConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };
    let dt = config.world.fixed_dt;

    // events leave the world through this channel and fan out to clients
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SimEvent>();
    let mut world = SimWorld::new(config.clone(), Box::new(event_tx)).context("building simulation world")?;
    let player = world.spawn_vehicle(VehicleRole::Player, vector![0.0, 1.0, 0.0], 0.0)?;

    let mut dispatcher = Dispatcher::new(config.dispatch.clone(), args.seed)?;
    if !args.no_police {
        let origin = Vector::zeros();
        for _ in 0..config.dispatch.pursuers_per_star {
            let point = dispatcher.spawn_point(&origin);
            let seed = dispatcher.next_seed();
            world.spawn_pursuer(player, point.position, point.yaw, seed)?;
        }
    }

    let world = Arc::new(Mutex::new(world));
    let state = Arc::new(Mutex::new(SharedGameState::new(player)));

    let listener = TcpListener::bind(&args.bind).await.with_context(|| format!("binding {}", args.bind))?;
    tokio::spawn(start_websocket_server(listener, Arc::clone(&state), Arc::clone(&world)));

    info!(dt, seed = args.seed, police = !args.no_police, "tick loop started");
    let mut ticker = interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }

        let snapshot = {
            let mut world = world.lock().await;
            if !args.no_police {
                if let Err(err) = dispatcher.dispatch(&mut world, player, dt) {
                    warn!(%err, "dispatch skipped");
                }
            }
            world.step();
            world.snapshot()
        };

        let mut game = state.lock().await;
        game.tick = snapshot.tick;
        while let Ok(event) = event_rx.try_recv() {
            info!(?event, "gameplay event");
            game.broadcast(&ServerMessage::Event(&event));
        }
        game.broadcast(&ServerMessage::Snapshot(&snapshot));
    }

    Ok(())
}
