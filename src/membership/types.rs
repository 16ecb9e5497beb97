use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Last-known health of a member, as believed by whoever holds the copy.
///
/// Transitions on the observing node: `Alive -> Suspect` after a failed
/// indirect probe, `Suspect -> Alive` on any fresh evidence of life, and
/// `Suspect -> Dead` once the suspicion timeout runs out. A `Dead` member is
/// evicted in the same step. Non-`Alive` entries adopted from a peer are
/// timed and then revived or evicted like local suspects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberState {
    Alive,
    Suspect,
    Dead,
}

impl MemberState {
    pub fn is_alive(self) -> bool {
        self == MemberState::Alive
    }
}

/// A network-addressable cluster participant.
///
/// `rpc_addr` is the `host:port` other nodes use to reach the member's
/// membership endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub node_id: NodeId,
    pub rpc_addr: String,
    pub state: MemberState,
}

impl Member {
    pub fn alive(node_id: impl Into<String>, rpc_addr: impl Into<String>) -> Self {
        Self {
            node_id: NodeId(node_id.into()),
            rpc_addr: rpc_addr.into(),
            state: MemberState::Alive,
        }
    }

    pub fn with_state(mut self, state: MemberState) -> Self {
        self.state = state;
        self
    }
}

/// Membership change notifications, one variant per topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberEvent {
    Join(Member),
    Update(Member),
    Leave(Member),
}

impl MemberEvent {
    pub fn member(&self) -> &Member {
        match self {
            MemberEvent::Join(member) | MemberEvent::Update(member) | MemberEvent::Leave(member) => {
                member
            }
        }
    }
}

/// Result of applying a Join to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Updated,
    Unchanged,
}

/// What the failure detector concluded about a probed member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// Reached directly or through a relay.
    Alive,
    /// Unreachable; marked `Suspect` and waiting for the suspicion timeout.
    Suspected,
    /// Unreachable and removed from the registry.
    Evicted,
    /// Nothing to do: unknown member or the local node.
    Skipped,
}
