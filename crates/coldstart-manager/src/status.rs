//! Status projection: orchestrator state to an external snapshot.
//!
//! A pure mapping with no side effects, consumed by the HTTP layer.
//! The snapshot is always well-formed; callers never observe internal
//! error detail beyond the coarse status value.

use std::time::{SystemTime, UNIX_EPOCH};

use coldstart_cloud::InstanceStatus;
use serde::Serialize;

use crate::manager::ManagerState;

/// Shown as the server name until the first successful probe.
const PLACEHOLDER_NAME: &str = "loading...";

/// Externally visible coarse status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicStatus {
    Active,
    Startup,
    StartupError,
    Off,
}

/// The status endpoint's response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: PublicStatus,
    /// Completed steps of the in-flight sequence, 0 when none.
    pub progress: u32,
    pub progress_max: u32,
    /// Last known address, empty until assigned.
    pub ip: String,
    /// Last known server name, a placeholder until first probed.
    pub name: String,
    pub online_player: u32,
    /// Unix seconds of the last observed player activity.
    pub last_online: u64,
}

/// Project the orchestrator state into a snapshot.
pub fn project(state: &ManagerState) -> StatusSnapshot {
    let ip = state
        .instance
        .as_ref()
        .map(|instance| instance.ip.clone())
        .unwrap_or_default();

    let (name, online_player) = match &state.last_info {
        Some(info) => (info.name.clone(), info.online),
        None => (PLACEHOLDER_NAME.to_string(), 0),
    };

    let last_online = state
        .last_player_seen
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);

    let (status, progress, progress_max) = match &state.startup {
        Some(startup) if startup.in_flight() => {
            (PublicStatus::Startup, startup.current, startup.max)
        }
        Some(startup) if startup.error => (PublicStatus::StartupError, startup.current, startup.max),
        _ => {
            let status = match state.instance.as_ref().map(|instance| instance.status) {
                Some(InstanceStatus::Active) => PublicStatus::Active,
                Some(InstanceStatus::Startup) => PublicStatus::Startup,
                _ => PublicStatus::Off,
            };
            (status, 0, 0)
        }
    };

    StatusSnapshot {
        status,
        progress,
        progress_max,
        ip,
        name,
        online_player,
        last_online,
    }
}
