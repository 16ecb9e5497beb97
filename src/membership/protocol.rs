//! Membership RPC Definitions
//!
//! Request/response bodies for the five membership calls and the HTTP
//! endpoints they are served on.

use super::types::{Member, MemberState, NodeId};
use serde::{Deserialize, Serialize};

pub const ENDPOINT_JOIN: &str = "/membership/join";
pub const ENDPOINT_LEAVE: &str = "/membership/leave";
pub const ENDPOINT_PING: &str = "/membership/ping";
pub const ENDPOINT_INDIRECT_PING: &str = "/membership/indirect_ping";
pub const ENDPOINT_SYNC_MEMBERS: &str = "/membership/sync";

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    pub member: Member,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    pub members: Vec<Member>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub member: Member,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LeaveResponse {}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub state: MemberState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndirectPingRequest {
    pub node_id: NodeId,
    pub rpc_addr: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndirectPingResponse {
    pub state: MemberState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncMembersRequest {
    pub members: Vec<Member>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncMembersResponse {
    pub members: Vec<Member>,
}

/// Body returned alongside non-2xx statuses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
