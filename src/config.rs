//! Node Configuration
//!
//! Tunables for the membership protocol. Defaults are suitable for a local
//! cluster; every field can be overridden through a `GOSSIP_*` environment
//! variable (durations in milliseconds).

use anyhow::Result;
use std::str::FromStr;
use std::time::Duration;

use crate::topic::types::EmitMode;

#[derive(Debug, Clone)]
pub struct MembershipConfig {
    /// How often the detector probes a random peer.
    pub probe_interval: Duration,
    /// How often a full-state exchange runs against a random peer.
    pub sync_interval: Duration,
    /// Upper bound on every outbound call.
    pub rpc_timeout: Duration,
    /// Time a member stays `Suspect` before eviction. Zero evicts on the first failed indirect probe.
    pub suspicion_timeout: Duration,
    /// Number of relays asked during an indirect probe.
    pub indirect_probes: usize,
    /// Queue size handed to subscribers that do not pick their own.
    pub subscriber_capacity: usize,
    pub emit_mode: EmitMode,
    /// Whether failure-driven evictions are announced on the leave topic.
    pub emit_leave_on_eviction: bool,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(1),
            sync_interval: Duration::from_secs(2),
            rpc_timeout: Duration::from_millis(500),
            suspicion_timeout: Duration::ZERO,
            indirect_probes: 1,
            subscriber_capacity: 64,
            emit_mode: EmitMode::Blocking,
            emit_leave_on_eviction: false,
        }
    }
}

impl MembershipConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, starting from the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64, _>(&lookup, "GOSSIP_PROBE_INTERVAL_MS")? {
            config.probe_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "GOSSIP_SYNC_INTERVAL_MS")? {
            config.sync_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "GOSSIP_RPC_TIMEOUT_MS")? {
            config.rpc_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "GOSSIP_SUSPICION_TIMEOUT_MS")? {
            config.suspicion_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, "GOSSIP_INDIRECT_PROBES")? {
            config.indirect_probes = n;
        }
        if let Some(n) = parse_var(&lookup, "GOSSIP_SUBSCRIBER_CAPACITY")? {
            config.subscriber_capacity = n;
        }
        if let Some(mode) = parse_var(&lookup, "GOSSIP_EMIT_MODE")? {
            config.emit_mode = mode;
        }
        if let Some(flag) = parse_var(&lookup, "GOSSIP_EMIT_LEAVE_ON_EVICTION")? {
            config.emit_leave_on_eviction = flag;
        }

        if config.rpc_timeout.is_zero() {
            anyhow::bail!("GOSSIP_RPC_TIMEOUT_MS must be greater than zero");
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(None),
    }
}
