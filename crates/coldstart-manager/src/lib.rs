//! coldstart-manager: the orchestrator.
//!
//! Owns the canonical server lifecycle state and drives it from two
//! directions:
//!
//! - on-demand start requests (from the HTTP layer) launch a creation
//!   or start sequence as a background task, at most one at a time;
//! - a periodic ticker probes the running server for players and tears
//!   the instance down once nobody has been seen for the configured
//!   idle delay.
//!
//! All state lives in one [`ManagerState`] behind a tokio mutex. The
//! lock is only ever held for in-memory reads and writes, never across
//! a provider or probe call, so the ticker and an in-flight sequence
//! interleave safely.

pub mod manager;
pub mod probe;
pub mod progress;
pub mod status;

pub use manager::{Manager, ManagerTuning, ServerSpec, StartOutcome};
pub use probe::LivenessProbe;
pub use progress::StartupProgress;
pub use status::{PublicStatus, StatusSnapshot};
