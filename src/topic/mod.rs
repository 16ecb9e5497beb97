//! In-process Event Topics
//!
//! A small typed publish/subscribe primitive used to fan membership changes out to
//! dependent subsystems (hash rings, cache invalidation, peer tables).
//!
//! ## Delivery Model
//! - **Subscribers**: Each listener owns a bounded `tokio::sync::mpsc` queue, registered under an id.
//! - **Ordering**: Events reach every listener in registration order, and each listener sees events
//!   in the order `emit` was called on the topic.
//! - **Back-pressure**: In `EmitMode::Blocking` a full queue stalls the emitter until space frees up.
//!   `EmitMode::DropOnFull` never waits; the event is dropped for that listener and counted instead.

pub mod topic;
pub mod types;

#[cfg(test)]
mod tests;
