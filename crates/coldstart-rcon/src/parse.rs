//! Extraction of hostname and player counts from `status` output.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ProbeError, ProbeResult};

static PLAYERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"players : (\d+) \((\d+) max\)").unwrap()
});

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"hostname: ([A-Za-z0-9 ]+)").unwrap()
});

/// Extract `(online, max)` player counts from a `status` response.
pub fn player_count(response: &str) -> ProbeResult<(u32, u32)> {
    let caps = PLAYERS
        .captures(response)
        .ok_or_else(|| ProbeError::Parse("no player count line".to_string()))?;

    let online = caps[1]
        .parse()
        .map_err(|_| ProbeError::Parse(format!("bad online count '{}'", &caps[1])))?;
    let max = caps[2]
        .parse()
        .map_err(|_| ProbeError::Parse(format!("bad max count '{}'", &caps[2])))?;

    Ok((online, max))
}

/// Extract the server hostname from a `status` response.
pub fn server_name(response: &str) -> ProbeResult<String> {
    let caps = HOSTNAME
        .captures(response)
        .ok_or_else(|| ProbeError::Parse("no hostname line".to_string()))?;
    Ok(caps[1].trim_end().to_string())
}
