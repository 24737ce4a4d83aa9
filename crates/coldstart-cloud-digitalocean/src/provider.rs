//! DigitalOcean provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use coldstart_cloud::{
    CloudError, CloudProvider, CloudResult, CreateOptions, Instance, Snapshot,
};
use serde_json::json;
use tracing::{debug, info};

use crate::api;

const API_BASE: &str = "https://api.digitalocean.com/v2";

/// DigitalOcean adapter over the v2 REST API.
pub struct DigitalOceanProvider {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl DigitalOceanProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, API_BASE)
    }

    /// Point the adapter at a different API base (tests).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();
        Self {
            client,
            token: token.into().trim().to_string(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> CloudResult<T> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::Transport(format!(
                "GET {url} returned {status}: {body}"
            )));
        }

        response.json::<T>().await.map_err(transport)
    }

    /// Droplet power actions share one endpoint with a `type` field.
    async fn post_droplet_action(&self, droplet_id: &str, kind: &str) -> CloudResult<()> {
        let url = self.url(&format!("/droplets/{droplet_id}/actions"));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "type": kind }))
            .send()
            .await
            .map_err(|e| CloudError::ActionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::ActionFailed(format!(
                "POST {url} returned {status}: {body}"
            )));
        }

        let envelope: api::ActionEnvelope = response
            .json()
            .await
            .map_err(|e| CloudError::ActionFailed(e.to_string()))?;

        if envelope.action.status == "errored" {
            return Err(CloudError::ActionFailed(format!(
                "{kind} reported status 'errored' for droplet {droplet_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for DigitalOceanProvider {
    fn name(&self) -> &str {
        api::PROVIDER_NAME
    }

    async fn lookup_ssh_key(&self, fingerprint: &str) -> CloudResult<String> {
        let url = self.url(&format!("/account/keys/{fingerprint}"));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CloudError::not_found("ssh key", fingerprint));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::Transport(format!(
                "GET {url} returned {status}: {body}"
            )));
        }

        let envelope: api::KeyEnvelope = response.json().await.map_err(transport)?;
        Ok(envelope.ssh_key.id.to_string())
    }

    async fn lookup_snapshot(&self, name: &str) -> CloudResult<Snapshot> {
        let list: api::ImageList = self
            .get_json("/images?private=true&page=1&per_page=200")
            .await?;
        api::find_snapshot(&list.images, name)
            .ok_or_else(|| CloudError::not_found("snapshot", name))
    }

    async fn lookup_instance(&self, name: &str) -> CloudResult<Instance> {
        let list: api::DropletList = self.get_json("/droplets?page=1&per_page=200").await?;
        let droplet = api::find_droplet(&list.droplets, name)
            .ok_or_else(|| CloudError::not_found("droplet", name))?;
        Ok(api::to_instance(droplet))
    }

    async fn start(&self, instance: &Instance) -> CloudResult<()> {
        self.post_droplet_action(&instance.id, "power_on").await?;
        info!(droplet = %instance.name, "power on requested");
        Ok(())
    }

    async fn stop(&self, instance: &Instance) -> CloudResult<()> {
        self.post_droplet_action(&instance.id, "shutdown").await?;
        info!(droplet = %instance.name, "graceful shutdown requested");
        Ok(())
    }

    async fn create(&self, options: &CreateOptions) -> CloudResult<Instance> {
        let url = self.url("/droplets");
        let snapshot_id: i64 = options
            .snapshot
            .id
            .parse()
            .map_err(|_| CloudError::CreateFailed(format!(
                "snapshot id '{}' is not numeric",
                options.snapshot.id
            )))?;

        let body = json!({
            "name": options.name,
            "region": options.region,
            "size": options.machine,
            "image": snapshot_id,
            "ssh_keys": [options.ssh_key],
            "ipv6": true,
            "monitoring": true,
        });

        debug!(
            name = %options.name,
            size = %options.machine,
            region = %options.region,
            snapshot = %options.snapshot.name,
            "creating droplet"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CloudError::CreateFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CloudError::CreateFailed(format!(
                "POST {url} returned {status}: {text}"
            )));
        }

        let envelope: api::DropletEnvelope = response
            .json()
            .await
            .map_err(|e| CloudError::CreateFailed(e.to_string()))?;

        Ok(api::to_instance(&envelope.droplet))
    }

    async fn destroy(&self, instance: &Instance) -> CloudResult<()> {
        let url = self.url(&format!("/droplets/{}", instance.id));
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| CloudError::DestroyFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::DestroyFailed(format!(
                "DELETE {url} returned {status}: {body}"
            )));
        }

        info!(droplet = %instance.name, "droplet deleted");
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> CloudError {
    CloudError::Transport(err.to_string())
}
