use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use board_view::{PeerGroup, ViewerId};
use thiserror::Error;
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::lobby::{assign_players, gather_viewers};
use super::scripted::ScriptedEngine;
use super::tcp_transport::TcpViewerListener;

#[derive(Debug, Error)]
pub(crate) enum HostError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config file {path} is invalid at '{field}': {source}")]
    ConfigParse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read scenario {path}: {source}")]
    ScenarioRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("scenario {path} is invalid at '{field}': {source}")]
    ScenarioParse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("scenario {path} turn {turn}: {message}")]
    ScenarioInvalid {
        path: PathBuf,
        turn: usize,
        message: String,
    },
    #[error("failed to bind viewer listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("no viewer completed the handshake before the lobby closed")]
    NoViewers,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_host(app) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "host_failed");
            ExitCode::FAILURE
        }
    }
}

fn run_host(app: AppWiring) -> Result<(), HostError> {
    let AppWiring { config, scenario } = app;
    let addr = config.bind_addr();
    let mut listener =
        TcpViewerListener::bind(addr).map_err(|source| HostError::Bind { addr, source })?;
    info!(port = listener.bound_port(), viewers = config.viewers, "host_listening");

    let seats = gather_viewers(&mut listener, &config);
    if seats.is_empty() {
        return Err(HostError::NoViewers);
    }

    let assignments = assign_players(seats.len(), scenario.game.players.len());
    let mut group = PeerGroup::new(config.wait_config());
    for (seat, ((transport, viewport), players)) in
        seats.into_iter().zip(assignments).enumerate()
    {
        group.join(ViewerId(seat as u64), players, viewport, Box::new(transport));
    }

    let summary = ScriptedEngine::new(scenario).run(&mut group);
    info!(
        turns_played = summary.turns_played,
        moves = summary.moves,
        undos = summary.undos,
        timeouts = summary.timeouts,
        winner = ?summary.winner.map(|player| player.0),
        viewers_left = group.len(),
        "host_finished"
    );
    Ok(())
}
