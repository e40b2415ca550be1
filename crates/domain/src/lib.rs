//! # geohub-domain
//!
//! Pure domain model for the geohub geofencing automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Geometry** (haversine distance, circle and polygon containment)
//! - Define **Areas** (named circle or polygon regions)
//! - Define **Rules** (area + trigger type + ordered actions, with per-entity
//!   containment memory)
//! - Define **Location updates** and the **control commands** emitted when a
//!   rule fires
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod area;
pub mod command;
pub mod geometry;
pub mod location;
pub mod rule;
