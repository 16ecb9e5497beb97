//! Gossip Membership Library
//!
//! Decentralized, eventually-consistent cluster membership for a fleet of
//! cooperating nodes. It serves as the foundation for the `gossip-node`
//! binary (`main.rs`).
//!
//! ## Modules
//! - **`membership`**: The member registry, the five protocol handlers (Join, Leave, Ping,
//!   IndirectPing, SyncMembers), relay-based failure detection and anti-entropy sync.
//! - **`topic`**: In-process publish/subscribe used to announce joins, updates and leaves
//!   to dependent subsystems.
//! - **`config`**: Protocol tunables and their environment overrides.

pub mod config;
pub mod membership;
pub mod topic;
