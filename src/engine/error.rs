use ulid::Ulid;

use crate::model::SessionId;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Batch contained no requests.
    EmptyBatch,
    /// The session's enrollment window is closed.
    EnrollmentClosed(SessionId),
    /// Batch named a person outside the actor's household.
    NotManagedByActor { actor: Ulid, person: Ulid },
    /// Session has no schedule yet; only cancellations are accepted.
    Unscheduled(SessionId),
    /// Capacity must be at least 1.
    InvalidCapacity(u32),
    /// Capacity update would drop below the current enrolled count.
    CapacityBelowEnrolled { session: SessionId, enrolled: usize },
    /// Clearing a session's schedule while people hold live rows.
    ScheduleInUse(SessionId),
    /// Post-batch invariant check found enrolled > capacity. Fatal: state is
    /// corrupt, not merely contended.
    CapacityBreached {
        session: SessionId,
        enrolled: usize,
        capacity: u32,
    },
    LimitExceeded(&'static str),
    Wal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::EmptyBatch => write!(f, "batch contains no requests"),
            EngineError::EnrollmentClosed(id) => {
                write!(f, "enrollment closed for session: {id}")
            }
            EngineError::NotManagedByActor { actor, person } => {
                write!(f, "person {person} is not managed by actor {actor}")
            }
            EngineError::Unscheduled(id) => {
                write!(f, "session {id} has no schedule; only cancel is allowed")
            }
            EngineError::InvalidCapacity(cap) => write!(f, "invalid capacity: {cap}"),
            EngineError::CapacityBelowEnrolled { session, enrolled } => {
                write!(
                    f,
                    "session {session} has {enrolled} enrolled; capacity cannot drop below that"
                )
            }
            EngineError::ScheduleInUse(id) => {
                write!(f, "session {id} has live participants; schedule cannot be cleared")
            }
            EngineError::CapacityBreached {
                session,
                enrolled,
                capacity,
            } => {
                write!(
                    f,
                    "invariant violated: session {session} has {enrolled} enrolled over capacity {capacity}"
                )
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Transient failures the caller may safely retry. Everything else is
    /// either a caller mistake or a fatal invariant breach.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Wal(_))
    }
}
