//! DigitalOcean wire types and the pure mapping helpers.

use coldstart_cloud::{Instance, InstanceStatus, Snapshot};
use serde::Deserialize;

pub const PROVIDER_NAME: &str = "digitalocean";

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct KeyEnvelope {
    pub ssh_key: SshKey,
}

#[derive(Debug, Deserialize)]
pub struct SshKey {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ImageList {
    pub images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
pub struct Image {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DropletList {
    pub droplets: Vec<Droplet>,
}

#[derive(Debug, Deserialize)]
pub struct DropletEnvelope {
    pub droplet: Droplet,
}

#[derive(Debug, Deserialize)]
pub struct Droplet {
    pub id: i64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub networks: Networks,
}

#[derive(Debug, Default, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub v4: Vec<NetworkV4>,
}

#[derive(Debug, Deserialize)]
pub struct NetworkV4 {
    pub ip_address: String,
    /// "public" or "private".
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionEnvelope {
    pub action: Action,
}

#[derive(Debug, Deserialize)]
pub struct Action {
    pub status: String,
}

// ── Mapping helpers ────────────────────────────────────────────────

/// Map a droplet status onto the canonical vocabulary.
pub fn map_status(status: &str) -> InstanceStatus {
    match status {
        "new" => InstanceStatus::Startup,
        "active" => InstanceStatus::Active,
        _ => InstanceStatus::Off,
    }
}

/// Select a user image by case-insensitive substring match.
///
/// First hit in listing order wins; the order is vendor-defined, so
/// ambiguous snapshot names give non-deterministic results.
pub fn find_snapshot(images: &[Image], name: &str) -> Option<Snapshot> {
    let wanted = name.trim().to_lowercase();
    images
        .iter()
        .find(|image| image.name.to_lowercase().contains(&wanted))
        .map(|image| Snapshot {
            name: image.name.clone(),
            id: image.id.to_string(),
        })
}

/// Select a droplet by case- and whitespace-insensitive exact name match.
pub fn find_droplet<'a>(droplets: &'a [Droplet], name: &str) -> Option<&'a Droplet> {
    let wanted = name.trim().to_lowercase();
    droplets
        .iter()
        .find(|droplet| droplet.name.trim().to_lowercase() == wanted)
}

/// First public v4 address, falling back to the first address of any kind.
pub fn public_ip(droplet: &Droplet) -> String {
    droplet
        .networks
        .v4
        .iter()
        .find(|net| net.kind == "public")
        .or_else(|| droplet.networks.v4.first())
        .map(|net| net.ip_address.clone())
        .unwrap_or_default()
}

/// Convert a wire droplet into a canonical instance.
pub fn to_instance(droplet: &Droplet) -> Instance {
    Instance {
        name: droplet.name.clone(),
        id: droplet.id.to_string(),
        ip: public_ip(droplet),
        status: map_status(&droplet.status),
        provider: PROVIDER_NAME.to_string(),
    }
}
