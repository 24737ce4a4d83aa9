//! Cloud provider trait definition.

use async_trait::async_trait;

use crate::error::CloudResult;
use crate::types::{CreateOptions, Instance, Snapshot};

/// One vendor's compute API, normalized to a fixed operation set.
///
/// All adapters (Hetzner Cloud, DigitalOcean, test fakes) implement this
/// trait. Calls are blocking network I/O from the caller's point of view:
/// adapters apply their own connection and read timeouts, but no retries.
/// Bounded retry loops belong to the orchestrator.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Provider name as configured (e.g. "hetzner", "digitalocean").
    fn name(&self) -> &str;

    /// Resolve an SSH key fingerprint to the vendor's opaque key id.
    ///
    /// Fails with `NotFound` when no key matches and `Transport` on
    /// connectivity or auth failure.
    async fn lookup_ssh_key(&self, fingerprint: &str) -> CloudResult<String>;

    /// Resolve a snapshot/image by name.
    ///
    /// Matching follows the vendor's convention (exact case-insensitive
    /// for some, substring for others). When several images match, the
    /// first one in vendor listing order wins; callers should keep
    /// snapshot names unambiguous.
    async fn lookup_snapshot(&self, name: &str) -> CloudResult<Snapshot>;

    /// Fetch the instance with the given name.
    ///
    /// Name matching is exact but case- and whitespace-insensitive. The
    /// vendor status is mapped to [`crate::InstanceStatus`]; unrecognized
    /// vendor statuses map to `Off`.
    async fn lookup_instance(&self, name: &str) -> CloudResult<Instance>;

    /// Power the instance on.
    ///
    /// Not idempotent: callers must not start an already-active instance.
    async fn start(&self, instance: &Instance) -> CloudResult<()>;

    /// Issue a graceful shutdown.
    async fn stop(&self, instance: &Instance) -> CloudResult<()>;

    /// Create a new instance from a snapshot.
    ///
    /// The returned instance carries the first address the vendor
    /// assigned, or an empty ip when none is available yet.
    async fn create(&self, options: &CreateOptions) -> CloudResult<Instance>;

    /// Delete the instance.
    ///
    /// Callers record `Destroyed` only after this returns Ok.
    async fn destroy(&self, instance: &Instance) -> CloudResult<()>;
}
