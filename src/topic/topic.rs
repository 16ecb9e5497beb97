use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};

use super::types::{EmitMode, EmitReport};

struct Subscriber<T> {
    id: String,
    sender: mpsc::Sender<T>,
}

/// A named fan-out point for events of type `T`.
///
/// Subscribers are kept in registration order. Emission never holds the
/// subscriber list lock while waiting on a queue, so `subscribe` and
/// `unsubscribe` stay responsive even when a listener is slow.
pub struct Topic<T> {
    name: String,
    mode: EmitMode,
    subscribers: RwLock<Vec<Subscriber<T>>>,
    emit_lock: Mutex<()>,
    dropped: AtomicU64,
}

impl<T> Topic<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(name: &str, mode: EmitMode) -> Self {
        Self {
            name: name.to_string(),
            mode,
            subscribers: RwLock::new(Vec::new()),
            emit_lock: Mutex::new(()),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a listener and returns the consumer side of its queue.
    ///
    /// A capacity of zero is treated as a single slot, which is the closest
    /// a tokio channel gets to a synchronous handoff. Subscribing twice with
    /// the same id replaces the earlier queue but keeps its position.
    pub async fn subscribe(&self, id: &str, capacity: usize) -> mpsc::Receiver<T> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let mut subscribers = self.subscribers.write().await;

        match subscribers.iter_mut().find(|sub| sub.id == id) {
            Some(existing) => {
                tracing::debug!("Topic '{}': replacing subscriber {}", self.name, id);
                existing.sender = sender;
            }
            None => {
                tracing::debug!("Topic '{}': new subscriber {}", self.name, id);
                subscribers.push(Subscriber {
                    id: id.to_string(),
                    sender,
                });
            }
        }

        receiver
    }

    /// Removes a listener. Returns `false` if the id was not registered.
    pub async fn unsubscribe(&self, id: &str) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|sub| sub.id != id);
        before != subscribers.len()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Total number of events dropped for full queues since creation.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Delivers `event` to every subscriber in registration order.
    ///
    /// In blocking mode this returns only once every live queue accepted the
    /// event. Subscribers whose receiver has been dropped are pruned.
    pub async fn emit(&self, event: T) -> EmitReport {
        let _ordering = self.emit_lock.lock().await;

        let targets: Vec<(String, mpsc::Sender<T>)> = self
            .subscribers
            .read()
            .await
            .iter()
            .map(|sub| (sub.id.clone(), sub.sender.clone()))
            .collect();

        let mut report = EmitReport::default();
        let mut closed = false;

        for (id, sender) in targets {
            match self.mode {
                EmitMode::Blocking => {
                    if sender.send(event.clone()).await.is_ok() {
                        report.delivered += 1;
                    } else {
                        closed = true;
                    }
                }
                EmitMode::DropOnFull => match sender.try_send(event.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        report.dropped += 1;
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            "Topic '{}': dropped event for slow subscriber {}",
                            self.name,
                            id
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed = true,
                },
            }
        }

        if closed {
            let mut subscribers = self.subscribers.write().await;
            let before = subscribers.len();
            subscribers.retain(|sub| !sub.sender.is_closed());
            report.pruned = before - subscribers.len();
            tracing::debug!(
                "Topic '{}': pruned {} closed subscriber(s)",
                self.name,
                report.pruned
            );
        }

        report
    }
}
