//! peaklog Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Mountain`, `GpxTrack`, `MountainFilter`, `AppData`
//! - **Logical clock** - `LastModified` markers and the `newer` comparator
//! - **Port definitions** - Traits for adapters: `IRemoteChannel`, `ISlotStore`
//! - **Configuration** - YAML-backed `Config`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement; the sync
//! engine in `peaklog-sync` orchestrates domain entities through them.

pub mod config;
pub mod domain;
pub mod ports;
