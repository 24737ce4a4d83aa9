//! coldstart-cloud: provider-agnostic compute instance abstraction.
//!
//! Models the lifecycle of a single remote compute instance (the game
//! server host) behind the [`CloudProvider`] trait. Vendor adapters
//! translate their own status vocabularies, pagination models, and
//! request shapes into the canonical types here, so the orchestrator
//! never branches on provider identity.

pub mod error;
pub mod provider;
pub mod retry;
pub mod types;

pub use error::{CloudError, CloudResult};
pub use provider::CloudProvider;
pub use retry::RetryPolicy;
pub use types::{CreateOptions, Instance, InstanceStatus, Snapshot};
