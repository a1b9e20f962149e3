//! Enrollment windows. A batch is only accepted while enrollment for the
//! target session is open; the engine asks the calendar, it never decides
//! this itself.

use dashmap::DashMap;

use crate::model::{Ms, SessionId, Span};

/// Decides whether enrollment changes are currently accepted for a session.
pub trait EnrollmentCalendar: Send + Sync {
    fn is_enrollment_open(&self, session: SessionId, now: Ms) -> bool;
}

/// Calendar that accepts everything. Useful for tests and single-event
/// deployments without a signup window.
pub struct AlwaysOpen;

impl EnrollmentCalendar for AlwaysOpen {
    fn is_enrollment_open(&self, _session: SessionId, _now: Ms) -> bool {
        true
    }
}

/// Per-session signup windows. A session with no registered window is closed.
pub struct WindowTable {
    windows: DashMap<SessionId, Span>,
}

impl WindowTable {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    pub fn set_window(&self, session: SessionId, window: Span) {
        self.windows.insert(session, window);
    }

    pub fn clear_window(&self, session: &SessionId) {
        self.windows.remove(session);
    }
}

impl Default for WindowTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrollmentCalendar for WindowTable {
    fn is_enrollment_open(&self, session: SessionId, now: Ms) -> bool {
        self.windows
            .get(&session)
            .is_some_and(|w| w.contains_instant(now))
    }
}
