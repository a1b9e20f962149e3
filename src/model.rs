use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

pub type PersonId = Ulid;
pub type SessionId = Ulid;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Touching endpoints do not overlap: `[a, b)` and `[b, c)` are disjoint.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// One person's relationship to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipationStatus {
    Enrolled,
    Waiting,
    Cancelled,
}

/// A ledger row. Rows are never deleted — cancellation flips the status and
/// keeps the row, so history and idempotence checks survive. Re-joining after
/// a cancellation creates a fresh row with a fresh, higher `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub id: Ulid,
    pub person_id: PersonId,
    pub session_id: SessionId,
    pub status: ParticipationStatus,
    /// Monotonic, engine-global, assigned at creation. Waitlist order is
    /// ascending `seq` among Waiting rows — first joined, first promoted.
    pub seq: u64,
    pub updated_at: Ms,
}

impl Participation {
    pub fn is_live(&self) -> bool {
        !matches!(self.status, ParticipationStatus::Cancelled)
    }
}

/// Per-session state: capacity, schedule, and the participation ledger.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: SessionId,
    /// Max enrolled participants (≥ 1).
    pub capacity: u32,
    /// `None` = unscheduled. An unscheduled session never conflicts with
    /// anything and is never eligible for enrollment.
    pub span: Option<Span>,
    /// All rows for this session, ascending `seq`.
    pub ledger: Vec<Participation>,
}

impl SessionState {
    pub fn new(id: SessionId, capacity: u32, span: Option<Span>) -> Self {
        Self {
            id,
            capacity,
            span,
            ledger: Vec::new(),
        }
    }

    /// Append a row. Rows arrive in `seq` order by construction; the assert
    /// guards replay bugs.
    pub fn push_row(&mut self, row: Participation) {
        debug_assert!(
            self.ledger.last().is_none_or(|last| last.seq < row.seq),
            "ledger rows must arrive in ascending seq order"
        );
        self.ledger.push(row);
    }

    pub fn row_mut(&mut self, id: Ulid) -> Option<&mut Participation> {
        self.ledger.iter_mut().find(|p| p.id == id)
    }

    /// The person's live (Enrolled or Waiting) row, if any. At most one
    /// exists per person.
    pub fn live(&self, person: PersonId) -> Option<&Participation> {
        self.ledger
            .iter()
            .find(|p| p.person_id == person && p.is_live())
    }

    pub fn enrolled_count(&self) -> usize {
        self.ledger
            .iter()
            .filter(|p| p.status == ParticipationStatus::Enrolled)
            .count()
    }

    /// Waiting rows in promotion order (ascending `seq`).
    pub fn waiting_in_order(&self) -> impl Iterator<Item = &Participation> {
        self.ledger
            .iter()
            .filter(|p| p.status == ParticipationStatus::Waiting)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    SessionCreated {
        id: SessionId,
        capacity: u32,
        span: Option<Span>,
    },
    SessionUpdated {
        id: SessionId,
        capacity: u32,
        span: Option<Span>,
    },
    Enrolled {
        id: Ulid,
        session_id: SessionId,
        person_id: PersonId,
        seq: u64,
        at: Ms,
    },
    Waitlisted {
        id: Ulid,
        session_id: SessionId,
        person_id: PersonId,
        seq: u64,
        at: Ms,
    },
    Cancelled {
        id: Ulid,
        session_id: SessionId,
        at: Ms,
    },
    Promoted {
        id: Ulid,
        session_id: SessionId,
        at: Ms,
    },
}

// ── Request / result types ───────────────────────────────────────

/// What a batch asks for, per person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Enroll,
    Waitlist,
    Cancel,
}

/// Why a person ended up on the waitlist instead of a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitlistReason {
    /// The person asked for the waitlist.
    Requested,
    /// All seats taken.
    Full,
    /// An existing enrollment overlaps this session; conflicts are re-checked
    /// at promotion time, they never block queue entry.
    TimeConflict,
}

/// Per-person validation failure, reported inside a successful batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyEnrolled,
    AlreadyWaiting,
    NotParticipating,
}

/// Outcome for one (person, action) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Enrolled,
    Waitlisted { reason: WaitlistReason },
    Cancelled,
    Rejected { reason: RejectReason },
}

/// A single waitlist promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub person_id: PersonId,
    pub participation: Ulid,
}

/// Result of one batch: an outcome per requested person, plus anyone promoted
/// from the waitlist as a side effect of cancellations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub outcomes: Vec<(PersonId, Outcome)>,
    pub promoted: Vec<Promotion>,
}

impl BatchResult {
    pub fn outcome_for(&self, person: PersonId) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|(p, _)| *p == person)
            .map(|(_, o)| *o)
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub capacity: u32,
    pub span: Option<Span>,
    pub enrolled: usize,
    pub waiting: usize,
}
