//! Persisted battle state: the `StateStore` port, its Redis-backed
//! production implementation, and an in-memory fake for tests
//! (spec.md §4.5).

pub mod error;
pub mod idempotency;
pub mod keys;
pub mod memory_store;
pub mod model;
pub mod redis_store;
pub mod scripts;
pub mod state_store;

pub use error::{Result, StoreError};
pub use idempotency::CommandIdempotency;
pub use memory_store::MemoryStore;
pub use model::{ClaimedBattle, EndOutcome, InitOutcome, StoreActionOutcome};
pub use redis_store::{lock_is_held, RedisStore};
pub use state_store::StateStore;
