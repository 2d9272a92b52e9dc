//! # parkhub-service
//!
//! The reservation and capacity allocation engine. Each service runs its
//! mutation inside one Entity Store transaction, flushes the read cache
//! once the transaction has committed, and hands follow-up work to the
//! [`TaskDispatcher`].
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references. Callers pass an already
//! authenticated [`Principal`].

pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod locks;
pub mod lot;
pub mod password;
pub mod query;
pub mod reservation;
pub mod search;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

pub use context::Principal;
pub use dispatch::TaskDispatcher;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use locks::LotLocks;
pub use lot::CapacityManager;
pub use query::{LotDetail, QueryService, UserAnalytics};
pub use reservation::{ReservationLifecycle, SpotAllocator, compute_cost};
pub use search::{KeywordIndex, rebuild_index};
pub use user::{NewUser, UserService};
