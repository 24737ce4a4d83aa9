//! coldstart-cloud-hetzner: Hetzner Cloud adapter.
//!
//! Talks to the public Hetzner Cloud REST API (<https://docs.hetzner.cloud>)
//! with Bearer token auth and maps servers, images, and SSH keys onto the
//! canonical `coldstart-cloud` types. Status vocabulary: `initializing`
//! maps to `Startup`, `running` to `Active`, everything else to `Off`.

pub mod api;
pub mod provider;

pub use provider::HetznerProvider;
