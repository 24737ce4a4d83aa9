//! Canonical domain types shared by all vendor adapters.

use serde::{Deserialize, Serialize};

/// Canonical lifecycle status of a compute instance.
///
/// Adapters map their vendor's status vocabulary onto these four values.
/// Anything an adapter does not recognize maps to `Off`, the safe
/// default: the orchestrator will neither probe nor power-cycle an `Off`
/// instance, only reclaim it once the idle delay expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Startup,
    Active,
    Off,
    Destroyed,
}

impl InstanceStatus {
    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Active => "active",
            Self::Off => "off",
            Self::Destroyed => "destroyed",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote compute instance as seen through a vendor adapter.
///
/// `id` and `ip` are only valid once the vendor has confirmed creation;
/// `ip` stays empty until an address is assigned. The orchestrator never
/// mutates an instance directly except to record `Destroyed` after a
/// confirmed deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Stable vendor-scoped name; the lookup key for all operations.
    pub name: String,
    /// Opaque vendor handle (numeric for some vendors, UUID for others).
    pub id: String,
    /// First public address, empty until assigned.
    pub ip: String,
    pub status: InstanceStatus,
    /// Name of the adapter that produced this instance.
    pub provider: String,
}

/// A machine image resolved by name, used only as a creation parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub id: String,
}

/// Parameters for creating a new instance from a snapshot.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub name: String,
    pub snapshot: Snapshot,
    /// Resolved SSH key id (not the fingerprint).
    pub ssh_key: String,
    /// Vendor machine type / size slug.
    pub machine: String,
    pub region: String,
}
