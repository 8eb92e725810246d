mod bootstrap;
mod lobby;
mod loop_runner;
mod scripted;
mod tcp_transport;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
use loop_runner::HostError;
