//! # Arena Sync Client Library
//!
//! Client-side real-time session synchronization for a multiplayer arena.
//! The library keeps a local mirror of a server-authoritative match: who is
//! in the room, where they are, how healthy they are, which projectiles are
//! in flight and which hazard zones are active. It also turns local input
//! into outbound intents.
//!
//! ## Architecture Overview
//!
//! Every component is a plain state machine that takes explicit `Instant`
//! timestamps and produces work for a driver. Nothing in the core touches a
//! socket or a clock on its own, which keeps every behavior testable without
//! a network.
//!
//! ### Connection Lifecycle
//! [`ConnectionManager`] owns the socket lifecycle: connect, heartbeat,
//! bounded reconnection, visibility recovery and the difference between a
//! permanent shutdown and a server-initiated room reset. It emits
//! [`ConnectionAction`]s that a transport driver executes.
//!
//! ### Message Routing
//! [`MessageRouter`] fans decoded server messages out to handlers keyed by a
//! closed set of message kinds. Registrations are idempotent and a failing
//! handler never stops the others.
//!
//! ### Entity Reconciliation
//! [`EntityReconciler`] merges authoritative snapshots and partial updates
//! into a per-entity registry. The local player's position is never
//! overwritten by the server, dead entities stay dead until an explicit
//! respawn, and remote entities are smoothed toward their latest position.
//!
//! ### Zones and Projectiles
//! [`ZoneSynchronizer`] runs the periodic effects of hazard zones and the
//! rate-limited server-driven shrinking zone. [`ProjectileStore`] tracks
//! short-lived projectiles, including optimistic local shots.
//!
//! ## Module Organization
//!
//! - `config`: tunables for every component
//! - `connection`: connection state machine and shared handle
//! - `entity`: player and NPC reconciliation
//! - `error`: error types
//! - `game`: [`GameSync`], which wires every component to the router
//! - `input`: throttled outbound intents
//! - `network`: tokio and WebSocket driver
//! - `projectile`: projectile lifetimes
//! - `router`: message dispatch
//! - `session`: match phase tracking
//! - `timers`: keyed timer registry
//! - `zones`: hazard zones
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::{Client, SyncConfig};
//!
//! # async fn run() -> Result<(), client::SyncError> {
//! let mut client = Client::new(SyncConfig::default(), "alice", "map1");
//! let intents = client.intents();
//! intents.send(client::Intent::ReadyToggle).ok();
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod game;
pub mod input;
pub mod network;
pub mod projectile;
pub mod router;
pub mod session;
pub mod timers;
pub mod zones;

pub use config::{ConnectionConfig, EntityConfig, InputConfig, ProjectileConfig, SyncConfig, ZoneConfig};
pub use connection::{ConnectionAction, ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionState};
pub use entity::{Diff, EntityEvent, EntityReconciler, MoveInput, NpcKind, PlayerKind, RemoteEntity, Snapshot};
pub use error::{HandlerError, SyncError};
pub use game::{GameSync, Notification};
pub use network::{Client, Intent, SessionEnd, TransportEvent};
pub use projectile::{Projectile, ProjectileStore};
pub use router::{Handler, Inbound, MessageRouter, Subscription};
pub use session::{PhaseTransition, Session, SessionStateTracker};
pub use zones::{ZoneEffect, ZoneGeometry, ZoneKind, ZoneSynchronizer};
