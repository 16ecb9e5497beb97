//! Topic Module Tests
//!
//! ## Test Scopes
//! - **Fan-out**: Every subscriber receives every event, in emission order.
//! - **Registration**: Subscribe/unsubscribe bookkeeping and pruning of dead listeners.
//! - **Back-pressure**: Blocking emitters stall on full queues, dropping emitters count losses.

#[cfg(test)]
mod tests {
    use crate::topic::topic::Topic;
    use crate::topic::types::EmitMode;
    use std::sync::Arc;
    use std::time::Duration;

    // ============================================================
    // FAN-OUT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_emit_reaches_every_subscriber() {
        let topic: Topic<u32> = Topic::new("numbers", EmitMode::Blocking);
        let mut first = topic.subscribe("first", 8).await;
        let mut second = topic.subscribe("second", 8).await;

        let report = topic.emit(7).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(first.recv().await, Some(7));
        assert_eq!(second.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_events_arrive_in_emit_order() {
        let topic: Topic<u32> = Topic::new("numbers", EmitMode::Blocking);
        let mut rx = topic.subscribe("reader", 16).await;

        for i in 0..10 {
            topic.emit(i).await;
        }

        for i in 0..10 {
            assert_eq!(rx.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_noop() {
        let topic: Topic<String> = Topic::new("empty", EmitMode::Blocking);

        let report = topic.emit("nobody listens".to_string()).await;

        assert_eq!(report.delivered, 0);
        assert_eq!(report.dropped, 0);
    }

    // ============================================================
    // REGISTRATION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let topic: Topic<u32> = Topic::new("numbers", EmitMode::Blocking);
        let _keep = topic.subscribe("keep", 4).await;
        let _gone = topic.subscribe("gone", 4).await;

        assert!(topic.unsubscribe("gone").await);
        assert!(!topic.unsubscribe("gone").await, "Second removal finds nothing");
        assert_eq!(topic.subscriber_count().await, 1);

        let report = topic.emit(1).await;
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let topic: Topic<u32> = Topic::new("numbers", EmitMode::Blocking);
        let mut alive = topic.subscribe("alive", 4).await;
        let dead = topic.subscribe("dead", 4).await;
        drop(dead);

        let report = topic.emit(3).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 1);
        assert_eq!(topic.subscriber_count().await, 1);
        assert_eq!(alive.recv().await, Some(3));
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_queue() {
        let topic: Topic<u32> = Topic::new("numbers", EmitMode::Blocking);
        let old = topic.subscribe("same", 4).await;
        let mut new = topic.subscribe("same", 4).await;
        drop(old);

        assert_eq!(topic.subscriber_count().await, 1);

        topic.emit(9).await;
        assert_eq!(new.recv().await, Some(9));
    }

    // ============================================================
    // BACK-PRESSURE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_blocking_emit_waits_for_slow_consumer() {
        let topic = Arc::new(Topic::<u32>::new("numbers", EmitMode::Blocking));
        // Zero capacity is normalized to a single slot.
        let mut rx = topic.subscribe("slow", 0).await;

        topic.emit(1).await;

        let pending = {
            let topic = topic.clone();
            tokio::spawn(async move { topic.emit(2).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished(), "Emit should stall while the queue is full");

        assert_eq!(rx.recv().await, Some(1));
        let report = pending.await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_drop_on_full_counts_losses() {
        let topic: Topic<u32> = Topic::new("numbers", EmitMode::DropOnFull);
        let mut rx = topic.subscribe("slow", 1).await;

        let first = topic.emit(1).await;
        let second = topic.emit(2).await;

        assert_eq!(first.delivered, 1);
        assert_eq!(second.dropped, 1);
        assert_eq!(topic.dropped_events(), 1);
        assert_eq!(rx.recv().await, Some(1));
    }

    #[test]
    fn test_emit_mode_parsing() {
        assert_eq!("blocking".parse::<EmitMode>().unwrap(), EmitMode::Blocking);
        assert_eq!("DROP".parse::<EmitMode>().unwrap(), EmitMode::DropOnFull);
        assert!("sometimes".parse::<EmitMode>().is_err());
    }
}
