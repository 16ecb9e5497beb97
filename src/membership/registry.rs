//! Member Registry
//!
//! The local, possibly stale replica of cluster membership. Every mutation
//! goes through one `tokio::sync::Mutex` guarding the whole map; there is no
//! per-key locking. Callers must not emit events or perform I/O while inside
//! [`MemberRegistry::update`].

use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::types::{Member, MemberState, NodeId};

pub type MemberMap = BTreeMap<NodeId, Member>;

pub struct MemberRegistry {
    members: Mutex<MemberMap>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self {
            members: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_members(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            members: Mutex::new(
                members
                    .into_iter()
                    .map(|member| (member.node_id.clone(), member))
                    .collect(),
            ),
        }
    }

    pub async fn get(&self, node_id: &NodeId) -> Option<Member> {
        self.members.lock().await.get(node_id).cloned()
    }

    /// Inserts or replaces, returning the previous entry.
    pub async fn put(&self, member: Member) -> Option<Member> {
        self.members
            .lock()
            .await
            .insert(member.node_id.clone(), member)
    }

    pub async fn delete(&self, node_id: &NodeId) -> Option<Member> {
        self.members.lock().await.remove(node_id)
    }

    /// Point-in-time copy, ordered by node id.
    pub async fn snapshot(&self) -> Vec<Member> {
        self.members.lock().await.values().cloned().collect()
    }

    pub async fn replace_all(&self, members: MemberMap) {
        *self.members.lock().await = members;
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    pub async fn alive_members(&self) -> Vec<Member> {
        self.members
            .lock()
            .await
            .values()
            .filter(|member| member.state.is_alive())
            .cloned()
            .collect()
    }

    /// Runs `f` with exclusive access to the whole map.
    ///
    /// This is how compound read-modify-write operations (Join, SyncMembers,
    /// state transitions) stay atomic with respect to each other.
    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut MemberMap) -> R,
    {
        let mut members = self.members.lock().await;
        f(&mut members)
    }
}

impl Default for MemberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Anti-entropy merge of a peer's view into the local one.
///
/// Per node id: entries known to only one side are kept; on conflict the
/// incoming entry wins if and only if it is `Alive`. The result's key set is
/// the union of both inputs.
pub fn merge_members(local: &MemberMap, incoming: &[Member]) -> MemberMap {
    let mut merged = local.clone();

    for remote in incoming {
        match merged.get(&remote.node_id) {
            Some(_) if remote.state != MemberState::Alive => {}
            _ => {
                merged.insert(remote.node_id.clone(), remote.clone());
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(members: &[Member]) -> MemberMap {
        members
            .iter()
            .map(|m| (m.node_id.clone(), m.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let registry = MemberRegistry::new();
        let member = Member::alive("n1", "127.0.0.1:7001");

        assert!(registry.put(member.clone()).await.is_none());
        assert_eq!(registry.get(&member.node_id).await, Some(member.clone()));
        assert_eq!(registry.delete(&member.node_id).await, Some(member.clone()));
        assert!(registry.get(&member.node_id).await.is_none());
        assert!(registry.delete(&member.node_id).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_sorted_copy() {
        let registry = MemberRegistry::with_members(vec![
            Member::alive("c", "127.0.0.1:3"),
            Member::alive("a", "127.0.0.1:1"),
            Member::alive("b", "127.0.0.1:2"),
        ]);

        let snapshot = registry.snapshot().await;
        registry.delete(&NodeId::from("a")).await;

        let ids: Vec<&str> = snapshot.iter().map(|m| m.node_id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(registry.len().await, 2, "Snapshot must not alias the live map");
    }

    #[tokio::test]
    async fn test_replace_all_swaps_contents() {
        let registry = MemberRegistry::with_members(vec![Member::alive("old", "addr-old")]);

        registry
            .replace_all(map(&[Member::alive("new", "addr-new")]))
            .await;

        assert!(registry.get(&NodeId::from("old")).await.is_none());
        assert!(registry.get(&NodeId::from("new")).await.is_some());
        assert!(!registry.is_empty().await);
    }

    #[test]
    fn test_merge_keeps_local_only_and_adopts_remote_only() {
        let local = map(&[Member::alive("a", "addr-a")]);
        let merged = merge_members(&local, &[Member::alive("b", "addr-b")]);

        assert_eq!(merged.len(), 2);
        assert!(merged.contains_key(&NodeId::from("a")));
        assert!(merged.contains_key(&NodeId::from("b")));
    }

    #[test]
    fn test_merge_prefers_alive_remote_on_conflict() {
        let local = map(&[Member::alive("a", "old-addr").with_state(MemberState::Suspect)]);
        let merged = merge_members(&local, &[Member::alive("a", "new-addr")]);

        let entry = &merged[&NodeId::from("a")];
        assert_eq!(entry.state, MemberState::Alive);
        assert_eq!(entry.rpc_addr, "new-addr");
    }

    #[test]
    fn test_merge_keeps_local_when_remote_not_alive() {
        let local = map(&[Member::alive("a", "addr-a")]);
        let merged = merge_members(
            &local,
            &[Member::alive("a", "other").with_state(MemberState::Dead)],
        );

        assert_eq!(merged[&NodeId::from("a")], Member::alive("a", "addr-a"));
    }

    #[test]
    fn test_merge_adopts_non_alive_remote_only_entries() {
        let merged = merge_members(
            &MemberMap::new(),
            &[Member::alive("x", "addr-x").with_state(MemberState::Suspect)],
        );

        assert_eq!(merged[&NodeId::from("x")].state, MemberState::Suspect);
    }
}
