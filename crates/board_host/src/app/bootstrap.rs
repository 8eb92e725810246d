use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use board_view::{Viewport, WaitConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::scripted::Scenario;
use super::HostError;

const CONFIG_ENV_VAR: &str = "BOARD_HOST_CONFIG";
const PORT_ENV_VAR: &str = "BOARD_HOST_PORT";
const SCENARIO_ENV_VAR: &str = "BOARD_HOST_SCENARIO";
const MOVE_LIMIT_ENV_VAR: &str = "BOARD_HOST_MOVE_LIMIT_MS";
const DEFAULT_PORT: u16 = 46100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct HostConfig {
    pub(crate) bind_address: IpAddr,
    pub(crate) port: u16,
    /// Viewers to wait for before the game starts.
    pub(crate) viewers: usize,
    pub(crate) scenario: Option<PathBuf>,
    pub(crate) lobby_timeout_ms: u64,
    pub(crate) handshake_timeout_ms: u64,
    pub(crate) poll_interval_ms: u64,
    pub(crate) move_time_limit_ms: u64,
    pub(crate) peer_messages_per_poll: usize,
    /// Used until a viewer reports its own size.
    pub(crate) default_width: u32,
    pub(crate) default_height: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        let wait = WaitConfig::default();
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            viewers: 1,
            scenario: None,
            lobby_timeout_ms: 60_000,
            handshake_timeout_ms: 5_000,
            poll_interval_ms: wait.poll_interval.as_millis() as u64,
            move_time_limit_ms: wait.move_time_limit.as_millis() as u64,
            peer_messages_per_poll: wait.peer_messages_per_poll,
            default_width: 1000,
            default_height: 800,
        }
    }
}

impl HostConfig {
    pub(crate) fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub(crate) fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            move_time_limit: Duration::from_millis(self.move_time_limit_ms),
            peer_messages_per_poll: self.peer_messages_per_poll.max(1),
        }
    }

    pub(crate) fn lobby_timeout(&self) -> Duration {
        Duration::from_millis(self.lobby_timeout_ms)
    }

    pub(crate) fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub(crate) fn default_viewport(&self) -> Viewport {
        Viewport::new(self.default_width, self.default_height)
    }
}

pub(crate) struct AppWiring {
    pub(crate) config: HostConfig,
    pub(crate) scenario: Scenario,
}

pub(crate) fn build_app() -> Result<AppWiring, HostError> {
    init_tracing();
    info!("=== Board Host Startup ===");

    let config = load_config(|name| std::env::var(name).ok())?;
    let scenario = match &config.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::demo(),
    };
    let scenario_name = config
        .scenario
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "demo".to_string());
    info!(
        port = config.port,
        viewers = config.viewers,
        scenario = %scenario_name,
        turns = scenario.turns.len(),
        "config_loaded"
    );

    Ok(AppWiring { config, scenario })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// File named by `BOARD_HOST_CONFIG` (if any), then single-value env overrides.
fn load_config<F>(lookup: F) -> Result<HostConfig, HostError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_ENV_VAR) {
        Some(path) => load_config_file(Path::new(&path))?,
        None => HostConfig::default(),
    };
    apply_env_overrides(&mut config, lookup);
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<HostConfig, HostError> {
    let raw = fs::read_to_string(path).map_err(|source| HostError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize::<_, HostConfig>(&mut deserializer).map_err(|error| {
        HostError::ConfigParse {
            path: path.to_path_buf(),
            field: error.path().to_string(),
            source: error.into_inner(),
        }
    })
}

fn apply_env_overrides<F>(config: &mut HostConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(PORT_ENV_VAR) {
        match value.parse::<u16>() {
            Ok(port) => config.port = port,
            Err(_) => warn!(
                value = %value,
                fallback_port = config.port,
                "host_invalid_port_override_ignored"
            ),
        }
    }
    if let Some(value) = lookup(SCENARIO_ENV_VAR) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            warn!("host_empty_scenario_override_ignored");
        } else {
            config.scenario = Some(PathBuf::from(trimmed));
        }
    }
    if let Some(value) = lookup(MOVE_LIMIT_ENV_VAR) {
        match value.parse::<u64>() {
            Ok(limit) if limit > 0 => config.move_time_limit_ms = limit,
            _ => warn!(
                value = %value,
                fallback_ms = config.move_time_limit_ms,
                "host_invalid_move_limit_override_ignored"
            ),
        }
    }
}
