//! Hetzner API wire types and the pure mapping helpers.
//!
//! Everything here is transport-free so the selection and status-mapping
//! rules unit-test without a server.

use coldstart_cloud::{Instance, InstanceStatus, Snapshot};
use serde::Deserialize;

pub const PROVIDER_NAME: &str = "hetzner";

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SshKeyList {
    pub ssh_keys: Vec<SshKey>,
}

#[derive(Debug, Deserialize)]
pub struct SshKey {
    pub id: i64,
    pub fingerprint: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageList {
    pub images: Vec<Image>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

/// List responses carry pagination state under `meta.pagination`.
#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    /// Absent or null on the last page.
    pub next_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Image {
    pub id: i64,
    /// Snapshots carry their human name in `description`, not `name`.
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub image_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ServerList {
    pub servers: Vec<Server>,
}

#[derive(Debug, Deserialize)]
pub struct ServerEnvelope {
    pub server: Server,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub id: i64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub public_net: PublicNet,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublicNet {
    pub ipv4: Option<Ipv4>,
}

#[derive(Debug, Deserialize)]
pub struct Ipv4 {
    pub ip: String,
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

/// Map a Hetzner server status onto the canonical vocabulary.
///
/// Unrecognized statuses (`stopping`, `deleting`, `migrating`, future
/// additions) map to `Off`.
pub fn map_status(status: &str) -> InstanceStatus {
    match status {
        "initializing" => InstanceStatus::Startup,
        "running" => InstanceStatus::Active,
        _ => InstanceStatus::Off,
    }
}

/// Next page number of a list response, `None` on the last page.
pub fn next_page(meta: &Option<Meta>) -> Option<i64> {
    meta.as_ref()?.pagination.as_ref()?.next_page
}

/// Select a snapshot by case-insensitive exact description match.
///
/// Only images of type `snapshot` are considered; the first match in
/// listing order wins.
pub fn find_snapshot(images: &[Image], name: &str) -> Option<Snapshot> {
    let wanted = name.to_lowercase();
    images
        .iter()
        .filter(|image| image.image_type == "snapshot")
        .find(|image| image.description.to_lowercase() == wanted)
        .map(|image| Snapshot {
            name: image.description.clone(),
            id: image.id.to_string(),
        })
}

/// Select a server by case- and whitespace-insensitive exact name match.
pub fn find_server<'a>(servers: &'a [Server], name: &str) -> Option<&'a Server> {
    let wanted = name.trim().to_lowercase();
    servers
        .iter()
        .find(|server| server.name.trim().to_lowercase() == wanted)
}

/// Convert a wire server into a canonical instance.
pub fn to_instance(server: &Server) -> Instance {
    Instance {
        name: server.name.clone(),
        id: server.id.to_string(),
        ip: server
            .public_net
            .ipv4
            .as_ref()
            .map(|v4| v4.ip.clone())
            .unwrap_or_default(),
        status: map_status(&server.status),
        provider: PROVIDER_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: i64, description: &str, image_type: &str) -> Image {
        Image {
            id,
            description: description.to_string(),
            image_type: image_type.to_string(),
        }
    }

    #[test]
    fn known_statuses_map_to_canonical() {
        assert_eq!(map_status("initializing"), InstanceStatus::Startup);
        assert_eq!(map_status("running"), InstanceStatus::Active);
        assert_eq!(map_status("off"), InstanceStatus::Off);
    }

    #[test]
    fn unknown_status_maps_to_off() {
        assert_eq!(map_status("migrating"), InstanceStatus::Off);
        assert_eq!(map_status(""), InstanceStatus::Off);
        assert_eq!(map_status("some-future-status"), InstanceStatus::Off);
    }

    #[test]
    fn snapshot_match_is_case_insensitive_and_skips_system_images() {
        let images = vec![
            image(1, "Game Base", "system"),
            image(2, "game base", "snapshot"),
            image(3, "other", "snapshot"),
        ];
        let snap = find_snapshot(&images, "GAME BASE").unwrap();
        assert_eq!(snap.id, "2");
        assert_eq!(snap.name, "game base");
    }

    #[test]
    fn snapshot_miss_returns_none() {
        let images = vec![image(1, "unrelated", "snapshot")];
        assert!(find_snapshot(&images, "game base").is_none());
    }

    #[test]
    fn next_page_reads_pagination_meta() {
        assert_eq!(next_page(&None), None);
        assert_eq!(next_page(&Some(Meta::default())), None);
        assert_eq!(
            next_page(&Some(Meta {
                pagination: Some(Pagination { next_page: Some(2) }),
            })),
            Some(2)
        );
        assert_eq!(
            next_page(&Some(Meta {
                pagination: Some(Pagination { next_page: None }),
            })),
            None
        );
    }

    #[test]
    fn image_list_meta_deserializes() {
        let body = r#"{
            "images": [{"id": 1, "description": "game base", "type": "snapshot"}],
            "meta": {"pagination": {"page": 1, "next_page": 2}}
        }"#;
        let list: ImageList = serde_json::from_str(body).unwrap();
        assert_eq!(next_page(&list.meta), Some(2));

        // Responses without meta still parse (last-page shape).
        let bare: ImageList = serde_json::from_str(r#"{"images": []}"#).unwrap();
        assert_eq!(next_page(&bare.meta), None);
    }

    #[test]
    fn server_match_ignores_case_and_whitespace() {
        let servers = vec![Server {
            id: 7,
            name: " Game-01 ".to_string(),
            status: "running".to_string(),
            public_net: PublicNet {
                ipv4: Some(Ipv4 {
                    ip: "203.0.113.9".to_string(),
                }),
            },
        }];
        let found = find_server(&servers, "game-01").unwrap();
        let instance = to_instance(found);
        assert_eq!(instance.id, "7");
        assert_eq!(instance.ip, "203.0.113.9");
        assert_eq!(instance.status, InstanceStatus::Active);
        assert_eq!(instance.provider, "hetzner");
    }

    #[test]
    fn missing_ipv4_yields_empty_ip() {
        let server = Server {
            id: 1,
            name: "game-01".to_string(),
            status: "initializing".to_string(),
            public_net: PublicNet::default(),
        };
        let instance = to_instance(&server);
        assert_eq!(instance.ip, "");
        assert_eq!(instance.status, InstanceStatus::Startup);
    }

    #[test]
    fn server_wire_format_deserializes() {
        let body = r#"{
            "servers": [{
                "id": 42,
                "name": "game-01",
                "status": "running",
                "public_net": {"ipv4": {"ip": "198.51.100.4"}}
            }]
        }"#;
        let list: ServerList = serde_json::from_str(body).unwrap();
        assert_eq!(list.servers.len(), 1);
        assert_eq!(to_instance(&list.servers[0]).status, InstanceStatus::Active);
    }
}
