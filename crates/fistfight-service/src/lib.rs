//! The service layer: Turn Service, Lifecycle Service, Deadline Worker,
//! Command Consumer, and the ports they depend on (realtime notifier,
//! event bus, player profile lookup). Event publishing is not a separate
//! module — `TurnService` and `LifecycleService` call `EventBus` directly
//! at the point a fact becomes durable, which is the only place spec.md
//! §4.10/§4.11 requires it to happen (see DESIGN.md).

pub mod bus;
pub mod command_consumer;
pub mod deadline_worker;
pub mod error;
pub mod lifecycle_service;
pub mod metrics;
pub mod profile;
pub mod realtime;
pub mod turn_service;

pub use bus::{BattleCreatedMessage, BattleEndedMessage, CreateBattleCommand, EventBus, NullEventBus};
pub use command_consumer::CommandConsumer;
pub use deadline_worker::{DeadlineWorker, DeadlineWorkerConfig};
pub use error::{Result, ServiceError};
pub use lifecycle_service::LifecycleService;
pub use profile::{PlayerProfile, PlayerProfileProvider, StaticProfileProvider};
pub use realtime::{BattleSnapshot, NullNotifier, RealtimeEvent, RealtimeNotifier};
pub use turn_service::TurnService;
