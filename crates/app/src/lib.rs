//! # geohub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `MessageBus` — publish/subscribe transport for commands and events
//!   - `ConfigStore` — durable storage of areas and rules
//! - Own the **geofence aggregate** (`GeofenceStore`): areas, rules, their
//!   per-entity containment memory and the `LocationTracker`, all behind one
//!   lock
//! - Provide the core algorithms:
//!   - `trigger_evaluator` — location update → rule transitions → firings
//!   - `ActionDispatcher` — firings → (possibly delayed) device commands
//! - Define **driving/inbound ports** as use-case structs:
//!   - `GeofenceService` — CRUD, location handling, snapshot publishing
//! - Provide **in-process infrastructure** (message bus, housekeeping task)
//!
//! ## Dependency rule
//! Depends on `geohub-domain` only (plus `tokio` for sync, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod action_dispatcher;
pub mod commands;
pub mod event_bus;
pub mod housekeeping;
pub mod location_tracker;
pub mod ports;
pub mod services;
pub mod store;
pub mod trigger_evaluator;
