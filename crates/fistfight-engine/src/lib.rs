//! The pure combat engine — clock, deterministic RNG, combat math, and the
//! domain state machine (spec.md §4.1-4.4). No I/O, no game-state mutation
//! beyond the value returned by `domain::resolve`.

pub mod clock;
pub mod combat_math;
pub mod domain;
pub mod rng;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{resolve, DomainError};
pub use rng::TurnRng;
