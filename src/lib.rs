//! rollcall — enrollment and waitlist engine for capacity-limited,
//! time-boxed sessions at multi-track events.
//!
//! The engine is a library: callers invoke it in-process, supply the
//! identity and event-clock collaborators, and get back structured
//! per-person outcomes. State is kept in memory and made durable through
//! an append-only WAL.

pub mod calendar;
pub mod directory;
pub mod engine;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod notify;
pub mod observability;
pub mod wal;

pub use engine::{Engine, EngineError};
pub use model::{Action, BatchResult, Outcome, RejectReason, Span, WaitlistReason};
