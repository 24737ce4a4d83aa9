//! Hetzner Cloud provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use coldstart_cloud::{
    CloudError, CloudProvider, CloudResult, CreateOptions, Instance, Snapshot,
};
use serde_json::json;
use tracing::{debug, info};

use crate::api;

const API_BASE: &str = "https://api.hetzner.cloud/v1";

/// Hetzner Cloud adapter over the public REST API.
pub struct HetznerProvider {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl HetznerProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, API_BASE)
    }

    /// Point the adapter at a different API base (tests).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        // Vendor calls must not hang forever: the orchestrator's poll
        // budgets assume each attempt returns within tens of seconds.
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

    async fn post_action(&self, path: &str) -> CloudResult<api::ActionEnvelope> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
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

        response
            .json::<api::ActionEnvelope>()
            .await
            .map_err(|e| CloudError::ActionFailed(e.to_string()))
    }
}

#[async_trait]
impl CloudProvider for HetznerProvider {
    fn name(&self) -> &str {
        api::PROVIDER_NAME
    }

    async fn lookup_ssh_key(&self, fingerprint: &str) -> CloudResult<String> {
        let list: api::SshKeyList = self
            .get_json(&format!("/ssh_keys?fingerprint={fingerprint}"))
            .await?;

        list.ssh_keys
            .iter()
            .find(|key| key.fingerprint == fingerprint)
            .map(|key| key.id.to_string())
            .ok_or_else(|| CloudError::not_found("ssh key", fingerprint))
    }

    /// Walks every page of the snapshot listing; the image API has no
    /// name filter, so truncating to one page would report `NotFound`
    /// for snapshots further down the account.
    async fn lookup_snapshot(&self, name: &str) -> CloudResult<Snapshot> {
        let mut page = 1;
        loop {
            let list: api::ImageList = self
                .get_json(&format!("/images?type=snapshot&per_page=50&page={page}"))
                .await?;
            if let Some(snapshot) = api::find_snapshot(&list.images, name) {
                return Ok(snapshot);
            }
            match api::next_page(&list.meta) {
                Some(next) => page = next,
                None => return Err(CloudError::not_found("image", name)),
            }
        }
    }

    async fn lookup_instance(&self, name: &str) -> CloudResult<Instance> {
        // Server-side name filter: exact match, at most one result, and
        // immune to the listing's page size.
        let list: api::ServerList = self.get_json(&format!("/servers?name={name}")).await?;
        let server = api::find_server(&list.servers, name)
            .ok_or_else(|| CloudError::not_found("server", name))?;
        Ok(api::to_instance(server))
    }

    async fn start(&self, instance: &Instance) -> CloudResult<()> {
        let envelope = self
            .post_action(&format!("/servers/{}/actions/poweron", instance.id))
            .await?;
        check_action(&envelope, "poweron", &instance.name)?;
        info!(server = %instance.name, "power on requested");
        Ok(())
    }

    async fn stop(&self, instance: &Instance) -> CloudResult<()> {
        let envelope = self
            .post_action(&format!("/servers/{}/actions/shutdown", instance.id))
            .await?;
        check_action(&envelope, "shutdown", &instance.name)?;
        info!(server = %instance.name, "graceful shutdown requested");
        Ok(())
    }

    async fn create(&self, options: &CreateOptions) -> CloudResult<Instance> {
        let url = self.url("/servers");
        let snapshot_id: i64 = options
            .snapshot
            .id
            .parse()
            .map_err(|_| CloudError::CreateFailed(format!(
                "snapshot id '{}' is not numeric",
                options.snapshot.id
            )))?;
        let ssh_key_id: i64 = options
            .ssh_key
            .parse()
            .map_err(|_| CloudError::CreateFailed(format!(
                "ssh key id '{}' is not numeric",
                options.ssh_key
            )))?;

        let body = json!({
            "name": options.name,
            "server_type": options.machine,
            "location": options.region,
            "image": snapshot_id,
            "ssh_keys": [ssh_key_id],
        });

        debug!(
            name = %options.name,
            machine = %options.machine,
            region = %options.region,
            snapshot = %options.snapshot.name,
            "creating server"
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

        let envelope: api::ServerEnvelope = response
            .json()
            .await
            .map_err(|e| CloudError::CreateFailed(e.to_string()))?;

        Ok(api::to_instance(&envelope.server))
    }

    async fn destroy(&self, instance: &Instance) -> CloudResult<()> {
        let url = self.url(&format!("/servers/{}", instance.id));
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

        info!(server = %instance.name, "server deleted");
        Ok(())
    }
}

fn check_action(envelope: &api::ActionEnvelope, action: &str, server: &str) -> CloudResult<()> {
    if envelope.action.status == "error" {
        return Err(CloudError::ActionFailed(format!(
            "{action} reported status 'error' for server {server}"
        )));
    }
    Ok(())
}

fn transport(err: reqwest::Error) -> CloudError {
    CloudError::Transport(err.to_string())
}
