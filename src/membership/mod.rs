//! Membership & Failure Detection Module
//!
//! Maintains each node's eventually-consistent view of the cluster without a
//! central coordinator.
//!
//! ## Core Mechanisms
//! - **Registry**: A single-lock table of known members, the local replica of cluster state.
//! - **Protocol Handlers**: Join, Leave, Ping, IndirectPing and SyncMembers mutate the registry
//!   and fan changes out on the join/update/leave topics.
//! - **Failure Detection**: Direct probes backed by relay (indirect) probes, with an optional
//!   suspicion period before a member is evicted.
//! - **Anti-Entropy**: Periodic full-state exchanges where an `Alive` report wins conflicts.
//!   This can resurrect a member one node already evicted if a peer has not yet noticed the
//!   failure; views still converge once the member is gone everywhere.

pub mod client;
pub mod detector;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod types;
