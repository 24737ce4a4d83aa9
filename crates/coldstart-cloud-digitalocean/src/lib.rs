//! coldstart-cloud-digitalocean: DigitalOcean adapter.
//!
//! Talks to the DigitalOcean v2 REST API
//! (<https://docs.digitalocean.com/reference/api/>) and maps droplets,
//! user images, and account SSH keys onto the canonical
//! `coldstart-cloud` types. Status vocabulary: `new` maps to `Startup`,
//! `active` to `Active`, everything else to `Off`.
//!
//! The droplets API has no server-side name filter, so instance lookup
//! lists one page (200 droplets) and matches client-side. Snapshot
//! lookup matches by case-insensitive substring, first hit wins.

pub mod api;
pub mod provider;

pub use provider::DigitalOceanProvider;
