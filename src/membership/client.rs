//! Outbound Membership Transport
//!
//! `MembershipClient` is the seam between the protocol logic and the network.
//! The service only ever talks to peers through this trait, which keeps the
//! handlers testable against an in-process network. `HttpMembershipClient`
//! is the production implementation over `reqwest`.

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::protocol::*;
use super::types::{Member, MemberState, NodeId};

/// Boxed future returned by every outbound call.
pub type RpcFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Outbound side of the five membership calls.
///
/// Implementations must bound every call with a timeout: an unresponsive
/// peer may never block the caller indefinitely.
pub trait MembershipClient: Send + Sync {
    fn join<'a>(&'a self, rpc_addr: &'a str, member: &'a Member) -> RpcFuture<'a, Vec<Member>>;

    fn leave<'a>(&'a self, rpc_addr: &'a str, member: &'a Member) -> RpcFuture<'a, ()>;

    fn ping<'a>(&'a self, rpc_addr: &'a str) -> RpcFuture<'a, MemberState>;

    /// Asks the relay at `relay_addr` to ping `target_addr` on our behalf.
    fn indirect_ping<'a>(
        &'a self,
        relay_addr: &'a str,
        node_id: &'a NodeId,
        target_addr: &'a str,
    ) -> RpcFuture<'a, MemberState>;

    fn sync_members<'a>(
        &'a self,
        rpc_addr: &'a str,
        members: &'a [Member],
    ) -> RpcFuture<'a, Vec<Member>>;
}

pub struct HttpMembershipClient {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpMembershipClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
        }
    }

    fn url(rpc_addr: &str, endpoint: &str) -> String {
        format!("http://{}{}", rpc_addr, endpoint)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let reason = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => String::from("no error body"),
        };
        Err(anyhow::anyhow!("Peer returned {}: {}", status, reason))
    }

    async fn post_json<Req, Resp>(&self, rpc_addr: &str, endpoint: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(Self::url(rpc_addr, endpoint))
            .json(body)
            .timeout(self.timeout)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }
}

impl MembershipClient for HttpMembershipClient {
    fn join<'a>(&'a self, rpc_addr: &'a str, member: &'a Member) -> RpcFuture<'a, Vec<Member>> {
        Box::pin(async move {
            let request = JoinRequest {
                member: member.clone(),
            };
            let response: JoinResponse = self.post_json(rpc_addr, ENDPOINT_JOIN, &request).await?;
            Ok(response.members)
        })
    }

    fn leave<'a>(&'a self, rpc_addr: &'a str, member: &'a Member) -> RpcFuture<'a, ()> {
        Box::pin(async move {
            let request = LeaveRequest {
                member: member.clone(),
            };
            let response = self
                .http_client
                .post(Self::url(rpc_addr, ENDPOINT_LEAVE))
                .json(&request)
                .timeout(self.timeout)
                .send()
                .await?;
            Self::check(response).await?;
            Ok(())
        })
    }

    fn ping<'a>(&'a self, rpc_addr: &'a str) -> RpcFuture<'a, MemberState> {
        Box::pin(async move {
            let response = self
                .http_client
                .get(Self::url(rpc_addr, ENDPOINT_PING))
                .timeout(self.timeout)
                .send()
                .await?;
            let body: PingResponse = Self::check(response).await?.json().await?;
            Ok(body.state)
        })
    }

    fn indirect_ping<'a>(
        &'a self,
        relay_addr: &'a str,
        node_id: &'a NodeId,
        target_addr: &'a str,
    ) -> RpcFuture<'a, MemberState> {
        Box::pin(async move {
            let request = IndirectPingRequest {
                node_id: node_id.clone(),
                rpc_addr: target_addr.to_string(),
            };
            // The relay runs its own ping bounded by the same timeout, so give it room.
            let response = self
                .http_client
                .post(Self::url(relay_addr, ENDPOINT_INDIRECT_PING))
                .json(&request)
                .timeout(self.timeout * 2)
                .send()
                .await?;
            let body: IndirectPingResponse = Self::check(response).await?.json().await?;
            Ok(body.state)
        })
    }

    fn sync_members<'a>(
        &'a self,
        rpc_addr: &'a str,
        members: &'a [Member],
    ) -> RpcFuture<'a, Vec<Member>> {
        Box::pin(async move {
            let request = SyncMembersRequest {
                members: members.to_vec(),
            };
            let response: SyncMembersResponse = self
                .post_json(rpc_addr, ENDPOINT_SYNC_MEMBERS, &request)
                .await?;
            Ok(response.members)
        })
    }
}
