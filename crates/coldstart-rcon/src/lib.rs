//! coldstart-rcon: Source RCON liveness probe.
//!
//! A single request/response exchange with the game server's remote
//! console: connect, authenticate, issue one `status` command, and
//! extract the hostname and player counts from the reply. No retries
//! happen here; bounded retry loops are the orchestrator's job.

pub mod codec;
pub mod error;
pub mod parse;
pub mod probe;

pub use error::{ProbeError, ProbeResult};
pub use probe::{RconProbe, ServerInfo};
