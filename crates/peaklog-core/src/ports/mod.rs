//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteChannel`] - Per-user remote record store (subscribe, upsert, delete, batch)
//! - [`ISlotStore`] - Durable local persistence slots for the local collections

pub mod remote_channel;
pub mod slot_store;

pub use remote_channel::{IRemoteChannel, Snapshot, SnapshotSender, Subscription};
pub use slot_store::ISlotStore;
