//! Liveness probe seam.
//!
//! The orchestrator talks to the game server through this trait so
//! tests can inject fakes; the production implementation is the RCON
//! client from `coldstart-rcon`.

use async_trait::async_trait;
use coldstart_rcon::{ProbeResult, RconProbe, ServerInfo};

/// One request/response exchange revealing server name and player count.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn status(&self, ip: &str) -> ProbeResult<ServerInfo>;
}

#[async_trait]
impl LivenessProbe for RconProbe {
    async fn status(&self, ip: &str) -> ProbeResult<ServerInfo> {
        RconProbe::status(self, ip).await
    }
}
