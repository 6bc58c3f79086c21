//! Core types for the fistfight battle engine — zero external deps beyond serde.
//!
//! This crate defines every type shared across the store, engine, and
//! service crates: ids, enums, the ruleset, battle/player state, actions,
//! and domain events. It has no game logic and no I/O — just data
//! definitions plus the handful of pure helpers (zone adjacency,
//! normalization) that are part of the wire/data shape itself.

pub mod action;
pub mod event;
pub mod ids;
pub mod ruleset;
pub mod state;
pub mod time;
pub mod zone;

pub use action::PlayerAction;
pub use event::BattleEvent;
pub use ids::*;
pub use ruleset::{CombatBalance, CritEffect, Ruleset};
pub use state::{BattleDomainState, EndReason, Phase, PlayerState, PlayerStats};
pub use time::UtcMillis;
pub use zone::Zone;
