//! Probe error taxonomy.

use thiserror::Error;

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Ways a liveness probe can fail.
///
/// All three are treated as "no evidence of players" by the caller;
/// none of them clears a previously recorded liveness snapshot.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The connection could not be established (or died mid-exchange).
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// The response did not correlate with the request, or auth was
    /// rejected.
    #[error("rcon protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The status text did not match the expected patterns.
    #[error("couldn't parse status response: {0}")]
    Parse(String),
}
