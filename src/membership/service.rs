use anyhow::Result;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

use super::client::MembershipClient;
use super::detector::FailureDetector;
use super::registry::{MemberMap, MemberRegistry, merge_members};
use super::types::{JoinOutcome, Member, MemberEvent, MemberState, NodeId};
use crate::config::MembershipConfig;
use crate::topic::topic::Topic;

/// The three membership event streams.
pub struct MembershipTopics {
    pub join: Topic<Member>,
    pub update: Topic<Member>,
    pub leave: Topic<Member>,
}

impl MembershipTopics {
    fn new(config: &MembershipConfig) -> Self {
        Self {
            join: Topic::new("member_join", config.emit_mode),
            update: Topic::new("member_update", config.emit_mode),
            leave: Topic::new("member_leave", config.emit_mode),
        }
    }
}

/// One node's view of the cluster and the handlers that maintain it.
///
/// Owns the member registry and the event topics. Inbound RPCs land on the
/// `handle_*` methods; the outbound half (joining, syncing, probing) talks to
/// peers through the injected [`MembershipClient`]. Events are always emitted
/// after the registry lock has been released, so a slow subscriber delays only
/// the call that produced the event.
pub struct MembershipService {
    pub local_member: Member,
    pub(super) registry: MemberRegistry,
    pub(super) topics: MembershipTopics,
    pub(super) client: Arc<dyn MembershipClient>,
    pub(super) detector: FailureDetector,
    pub(super) config: MembershipConfig,
    shutdown: broadcast::Sender<()>,
}

impl MembershipService {
    pub fn new(
        node_id: NodeId,
        rpc_addr: String,
        config: MembershipConfig,
        client: Arc<dyn MembershipClient>,
    ) -> Arc<Self> {
        let local_member = Member {
            node_id,
            rpc_addr,
            state: MemberState::Alive,
        };
        let (shutdown, _) = broadcast::channel(1);

        Arc::new(Self {
            registry: MemberRegistry::with_members(vec![local_member.clone()]),
            topics: MembershipTopics::new(&config),
            detector: FailureDetector::new(&config),
            local_member,
            client,
            config,
            shutdown,
        })
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_member.node_id
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    pub fn registry(&self) -> &MemberRegistry {
        &self.registry
    }

    pub fn topics(&self) -> &MembershipTopics {
        &self.topics
    }

    pub async fn members(&self) -> Vec<Member> {
        self.registry.snapshot().await
    }

    pub async fn get_member(&self, node_id: &NodeId) -> Option<Member> {
        self.registry.get(node_id).await
    }

    pub async fn get_alive_members(&self) -> Vec<Member> {
        self.registry.alive_members().await
    }

    pub async fn subscribe_join(&self, id: &str) -> mpsc::Receiver<Member> {
        self.topics
            .join
            .subscribe(id, self.config.subscriber_capacity)
            .await
    }

    pub async fn subscribe_update(&self, id: &str) -> mpsc::Receiver<Member> {
        self.topics
            .update
            .subscribe(id, self.config.subscriber_capacity)
            .await
    }

    pub async fn subscribe_leave(&self, id: &str) -> mpsc::Receiver<Member> {
        self.topics
            .leave
            .subscribe(id, self.config.subscriber_capacity)
            .await
    }

    pub(super) async fn publish(&self, events: Vec<MemberEvent>) {
        for event in events {
            match event {
                MemberEvent::Join(member) => self.topics.join.emit(member).await,
                MemberEvent::Update(member) => self.topics.update.emit(member).await,
                MemberEvent::Leave(member) => self.topics.leave.emit(member).await,
            };
        }
    }

    // ============================================================
    // INBOUND HANDLERS
    // ============================================================

    /// Registers (or refreshes) the caller and returns the full member list.
    ///
    /// A payload that is byte-identical to the stored entry is a no-op and
    /// emits nothing. Serialization failures abort before any mutation.
    pub async fn handle_join(&self, member: Member) -> Result<Vec<Member>> {
        let (outcome, members) = self.apply_join(member).await?;
        tracing::debug!("Join handled with outcome {:?}", outcome);
        Ok(members)
    }

    pub async fn apply_join(&self, member: Member) -> Result<(JoinOutcome, Vec<Member>)> {
        // Encoded before taking the lock, so a failure leaves the registry untouched.
        let incoming = bincode::serialize(&member)?;

        if member.node_id == self.local_member.node_id && member != self.local_member {
            anyhow::bail!(
                "Join for {} conflicts with the local node identity",
                member.node_id
            );
        }

        let (outcome, members) = self
            .registry
            .update(|members| -> Result<(JoinOutcome, Vec<Member>)> {
                let outcome = match members.get(&member.node_id) {
                    None => JoinOutcome::Joined,
                    Some(existing) if bincode::serialize(existing)? == incoming => {
                        JoinOutcome::Unchanged
                    }
                    Some(_) => JoinOutcome::Updated,
                };

                if outcome != JoinOutcome::Unchanged {
                    members.insert(member.node_id.clone(), member.clone());
                }

                Ok((outcome, members.values().cloned().collect()))
            })
            .await?;

        if outcome != JoinOutcome::Unchanged {
            self.detector.watch(std::slice::from_ref(&member));
        }

        match outcome {
            JoinOutcome::Joined => {
                info!("Node {} joined at {}", member.node_id, member.rpc_addr);
                info!("Cluster size now: {}", members.len());
                self.publish(vec![MemberEvent::Join(member)]).await;
            }
            JoinOutcome::Updated => {
                info!(
                    "Node {} rejoined with new details ({}, {:?})",
                    member.node_id, member.rpc_addr, member.state
                );
                self.publish(vec![MemberEvent::Update(member)]).await;
            }
            JoinOutcome::Unchanged => {}
        }

        Ok((outcome, members))
    }

    /// Removes the caller. Always announces the leave, even for unknown ids.
    ///
    /// A leave naming the local node is announced but never removes it.
    pub async fn handle_leave(&self, member: Member) {
        if member.node_id == self.local_member.node_id {
            tracing::warn!("Ignoring leave for the local node {}", member.node_id);
            self.publish(vec![MemberEvent::Leave(member)]).await;
            return;
        }

        let removed = self.registry.delete(&member.node_id).await;
        self.detector.forget(&member.node_id);

        if removed.is_some() {
            info!("Node {} left the cluster", member.node_id);
        } else {
            tracing::debug!("Leave for unknown node {}", member.node_id);
        }

        self.publish(vec![MemberEvent::Leave(member)]).await;
    }

    /// Liveness probe. A node that can answer is alive by construction.
    pub async fn handle_ping(&self) -> MemberState {
        self.local_member.state
    }

    /// Probes `rpc_addr` on behalf of another node.
    ///
    /// A failed probe is returned as an error rather than a made-up state, so
    /// the asking node can tell "relay said not alive" from "relay failed".
    pub async fn handle_indirect_ping(&self, node_id: &NodeId, rpc_addr: &str) -> Result<MemberState> {
        tracing::debug!("Relaying ping to {} at {}", node_id, rpc_addr);

        let state = self
            .client
            .ping(rpc_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Relay probe of {} failed: {}", node_id, e))?;

        tracing::debug!("Relay probe of {} answered {:?}", node_id, state);
        Ok(state)
    }

    /// Anti-entropy exchange: merges the peer's view, replaces the local
    /// registry with the result and hands the same set back.
    pub async fn handle_sync_members(&self, incoming: Vec<Member>) -> Vec<Member> {
        let local_member = self.local_member.clone();

        let (members, events) = self
            .registry
            .update(|members| {
                let mut merged = merge_members(members, &incoming);
                merged.insert(local_member.node_id.clone(), local_member);

                let events = diff_views(members, &merged);
                *members = merged;

                (members.values().cloned().collect::<Vec<_>>(), events)
            })
            .await;
        self.detector.watch(&members);

        if !events.is_empty() {
            info!(
                "Sync applied {} change(s), cluster size now: {}",
                events.len(),
                members.len()
            );
        }
        self.publish(events).await;

        members
    }

    // ============================================================
    // OUTBOUND OPERATIONS
    // ============================================================

    /// Joins through each seed in turn and merges the returned views.
    pub async fn join_cluster(&self, seeds: &[String]) -> Result<()> {
        if seeds.is_empty() {
            info!("No seed nodes, starting as founder");
            return Ok(());
        }

        let mut joined = 0;
        for seed in seeds {
            match self.client.join(seed, &self.local_member).await {
                Ok(members) => {
                    info!("Joined via {} ({} members)", seed, members.len());
                    self.handle_sync_members(members).await;
                    joined += 1;
                }
                Err(e) => tracing::warn!("Join via seed {} failed: {}", seed, e),
            }
        }

        if joined == 0 {
            anyhow::bail!("Could not join through any of {} seed node(s)", seeds.len());
        }
        Ok(())
    }

    /// Announces departure to every known peer, best effort.
    pub async fn leave_cluster(&self) {
        for peer in self.peers().await {
            if let Err(e) = self.client.leave(&peer.rpc_addr, &self.local_member).await {
                tracing::warn!("Failed to send leave to {}: {}", peer.node_id, e);
            }
        }
    }

    /// Sends our view to `rpc_addr` and adopts the merged view it returns.
    pub async fn sync_with(&self, rpc_addr: &str) -> Result<()> {
        let snapshot = self.registry.snapshot().await;
        let merged = self.client.sync_members(rpc_addr, &snapshot).await?;
        self.handle_sync_members(merged).await;
        Ok(())
    }

    /// Every member except the local node.
    pub async fn peers(&self) -> Vec<Member> {
        self.registry
            .snapshot()
            .await
            .into_iter()
            .filter(|member| member.node_id != self.local_member.node_id)
            .collect()
    }

    pub async fn sync_round(&self) {
        let candidates: Vec<Member> = self
            .peers()
            .await
            .into_iter()
            .filter(|member| member.state.is_alive())
            .collect();

        let Some(target) = candidates.choose(&mut rand::thread_rng()).cloned() else {
            return;
        };

        if let Err(e) = self.sync_with(&target.rpc_addr).await {
            tracing::warn!("Sync with {} failed: {}", target.node_id, e);
        }
    }

    pub async fn probe_round(&self) {
        let candidates = self.peers().await;
        let target = candidates.choose(&mut rand::thread_rng()).cloned();

        if let Some(target) = target {
            let verdict = self.probe_member(&target).await;
            tracing::debug!("Probe of {} -> {:?}", target.node_id, verdict);
        }

        self.reap_suspects().await;
    }

    /// Spawns the probe and sync loops. They run until [`Self::shutdown`].
    pub async fn start(self: Arc<Self>) {
        info!("Starting membership service for {}", self.local_member.node_id);

        let _probe_handle = {
            let service = self.clone();
            let mut shutdown = self.shutdown.subscribe();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(service.config.probe_interval);
                loop {
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = interval.tick() => service.probe_round().await,
                    }
                }
                tracing::debug!("Probe loop stopped");
            })
        };

        let _sync_handle = {
            let service = self.clone();
            let mut shutdown = self.shutdown.subscribe();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(service.config.sync_interval);
                loop {
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = interval.tick() => service.sync_round().await,
                    }
                }
                tracing::debug!("Sync loop stopped");
            })
        };

        info!("All background tasks started");
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

/// Events describing how `before` turned into `after` during a merge.
fn diff_views(before: &MemberMap, after: &MemberMap) -> Vec<MemberEvent> {
    after
        .iter()
        .filter_map(|(node_id, member)| match before.get(node_id) {
            None => Some(MemberEvent::Join(member.clone())),
            Some(previous) if previous != member => Some(MemberEvent::Update(member.clone())),
            Some(_) => None,
        })
        .collect()
}
