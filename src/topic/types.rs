use serde::{Deserialize, Serialize};

/// How a topic behaves when a subscriber's queue is full.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EmitMode {
    /// Wait until every subscriber accepted the event.
    #[default]
    Blocking,
    /// Skip subscribers whose queue is full and count the drop.
    DropOnFull,
}

impl std::str::FromStr for EmitMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blocking" => Ok(EmitMode::Blocking),
            "drop" | "drop_on_full" => Ok(EmitMode::DropOnFull),
            other => Err(anyhow::anyhow!("Unknown emit mode: {}", other)),
        }
    }
}

/// Outcome of a single `emit` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub delivered: usize,
    pub dropped: usize,
    pub pruned: usize,
}
