//! Failure Detection
//!
//! Direct probe first, then up to `indirect_probes` relays asked to probe the
//! target on our behalf. Only when every path fails does the target become
//! `Suspect` (or get evicted right away when the suspicion timeout is zero).
//!
//! A relay that cannot be reached and a relay reporting "not alive" count the
//! same: both are a failed path. Under a partition this can evict a healthy
//! node; the suspicion timeout is the knob that trades detection latency for
//! fewer false positives.

use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::service::MembershipService;
use super::types::{Member, MemberEvent, MemberState, NodeId, ProbeVerdict};
use crate::config::MembershipConfig;

/// Suspicion bookkeeping for the local detector.
pub struct FailureDetector {
    suspicion_timeout: Duration,
    indirect_probes: usize,
    suspects: DashMap<NodeId, Instant>,
}

impl FailureDetector {
    pub fn new(config: &MembershipConfig) -> Self {
        Self {
            suspicion_timeout: config.suspicion_timeout,
            indirect_probes: config.indirect_probes,
            suspects: DashMap::new(),
        }
    }

    pub fn suspicion_timeout(&self) -> Duration {
        self.suspicion_timeout
    }

    pub fn is_suspected(&self, node_id: &NodeId) -> bool {
        self.suspects.contains_key(node_id)
    }

    pub fn suspect_count(&self) -> usize {
        self.suspects.len()
    }

    pub(super) fn forget(&self, node_id: &NodeId) {
        self.suspects.remove(node_id);
    }

    fn start_suspicion(&self, node_id: &NodeId) {
        self.suspects.insert(node_id.clone(), Instant::now());
    }

    /// Starts timers for adopted entries that arrived already non-`Alive`,
    /// so they are reaped or refuted like locally raised suspicions.
    pub(super) fn watch(&self, members: &[Member]) {
        for member in members.iter().filter(|member| !member.state.is_alive()) {
            if !self.is_suspected(&member.node_id) {
                self.start_suspicion(&member.node_id);
            }
        }
    }

    fn expired(&self, now: Instant) -> Vec<NodeId> {
        self.suspects
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) >= self.suspicion_timeout)
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl MembershipService {
    /// Runs one full probe of `target` and acts on the verdict.
    pub async fn probe_member(&self, target: &Member) -> ProbeVerdict {
        if target.node_id == self.local_member.node_id {
            return ProbeVerdict::Skipped;
        }

        match self.client.ping(&target.rpc_addr).await {
            Ok(MemberState::Alive) => {
                self.refute_suspicion(&target.node_id).await;
                return ProbeVerdict::Alive;
            }
            Ok(state) => tracing::debug!("{} answered ping with {:?}", target.node_id, state),
            Err(e) => tracing::debug!("Direct ping to {} failed: {}", target.node_id, e),
        }

        let relays = self.pick_relays(target).await;
        if relays.is_empty() {
            warn!(
                "No relay available for {}, acting on direct probe alone",
                target.node_id
            );
            return self.declare_unreachable(target).await;
        }

        for relay in relays {
            match self
                .client
                .indirect_ping(&relay.rpc_addr, &target.node_id, &target.rpc_addr)
                .await
            {
                Err(e) => {
                    warn!(
                        "Indirect ping of {} via {} failed: {}",
                        target.node_id, relay.node_id, e
                    );
                }
                Ok(MemberState::Alive) => {
                    tracing::debug!("{} reachable via {}", target.node_id, relay.node_id);
                    self.refute_suspicion(&target.node_id).await;
                    return ProbeVerdict::Alive;
                }
                Ok(state) => {
                    warn!(
                        "Relay {} reports {} as {:?}",
                        relay.node_id, target.node_id, state
                    );
                }
            }
        }

        self.declare_unreachable(target).await
    }

    async fn pick_relays(&self, target: &Member) -> Vec<Member> {
        let candidates: Vec<Member> = self
            .peers()
            .await
            .into_iter()
            .filter(|member| member.node_id != target.node_id && member.state.is_alive())
            .collect();

        candidates
            .choose_multiple(&mut rand::thread_rng(), self.detector.indirect_probes)
            .cloned()
            .collect()
    }

    async fn declare_unreachable(&self, target: &Member) -> ProbeVerdict {
        if self.detector.suspicion_timeout.is_zero() {
            return match self.remove_member_from_state(&target.node_id).await {
                Some(_) => ProbeVerdict::Evicted,
                None => ProbeVerdict::Skipped,
            };
        }

        self.suspect_member(&target.node_id).await
    }

    /// Moves an `Alive` member to `Suspect` and starts its suspicion timer.
    pub async fn suspect_member(&self, node_id: &NodeId) -> ProbeVerdict {
        let suspected = self
            .registry
            .update(|members| match members.get_mut(node_id) {
                Some(member) if member.state == MemberState::Alive => {
                    member.state = MemberState::Suspect;
                    Some(Some(member.clone()))
                }
                Some(_) => Some(None),
                None => None,
            })
            .await;

        match suspected {
            Some(Some(member)) => {
                self.detector.start_suspicion(node_id);
                warn!("Node {} suspected", node_id);
                self.publish(vec![MemberEvent::Update(member)]).await;
                ProbeVerdict::Suspected
            }
            Some(None) => {
                if !self.detector.is_suspected(node_id) {
                    self.detector.start_suspicion(node_id);
                }
                ProbeVerdict::Suspected
            }
            None => ProbeVerdict::Skipped,
        }
    }

    /// Clears a suspicion after fresh evidence that the member is alive.
    ///
    /// Any non-`Alive` entry is revived, including `Dead` ones adopted from a
    /// peer's view.
    async fn refute_suspicion(&self, node_id: &NodeId) {
        self.detector.forget(node_id);

        let refuted = self
            .registry
            .update(|members| match members.get_mut(node_id) {
                Some(member) if !member.state.is_alive() => {
                    member.state = MemberState::Alive;
                    Some(member.clone())
                }
                _ => None,
            })
            .await;

        if let Some(member) = refuted {
            info!("Node {} refuted suspicion", node_id);
            self.publish(vec![MemberEvent::Update(member)]).await;
        }
    }

    /// Failure-driven eviction. Returns the evicted member marked `Dead`.
    ///
    /// The local node is never evicted. A leave event is published only when
    /// `emit_leave_on_eviction` is configured.
    pub async fn remove_member_from_state(&self, node_id: &NodeId) -> Option<Member> {
        if node_id == &self.local_member.node_id {
            warn!("Refusing to evict the local node");
            return None;
        }

        self.detector.forget(node_id);
        let evicted = self.registry.delete(node_id).await?;
        Some(self.finish_eviction(evicted).await)
    }

    async fn finish_eviction(&self, mut evicted: Member) -> Member {
        evicted.state = MemberState::Dead;

        info!("Node {} declared dead and evicted", evicted.node_id);
        if self.config.emit_leave_on_eviction {
            self.publish(vec![MemberEvent::Leave(evicted.clone())]).await;
        }

        evicted
    }

    /// Evicts members whose suspicion outlived the timeout.
    ///
    /// A member that is `Alive` again in the registry (refuted through a join
    /// or a sync) just loses its stale timer.
    pub async fn reap_suspects(&self) -> Vec<Member> {
        let mut evicted = Vec::new();

        for node_id in self.detector.expired(Instant::now()) {
            let removed = self
                .registry
                .update(|members| {
                    let suspect = members
                        .get(&node_id)
                        .is_some_and(|member| !member.state.is_alive());
                    if suspect { members.remove(&node_id) } else { None }
                })
                .await;
            self.detector.forget(&node_id);

            if let Some(member) = removed {
                evicted.push(self.finish_eviction(member).await);
            }
        }

        evicted
    }
}
