use crate::model::*;

use super::{Engine, EngineError};

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    use crate::limits::*;
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("span too wide"));
    }
    Ok(())
}

/// Does any enrollment (other than one in the candidate session itself)
/// overlap the candidate span? Only Enrolled rows block; Waiting and
/// Cancelled never do.
pub(crate) fn conflicts_with(
    enrollments: &[(SessionId, Span)],
    candidate_session: SessionId,
    candidate: &Span,
) -> bool {
    enrollments
        .iter()
        .any(|(session, span)| *session != candidate_session && span.overlaps(candidate))
}

impl Engine {
    /// Would enrolling `person` into the candidate session clash with a seat
    /// they already hold elsewhere? A candidate with no schedule never
    /// conflicts.
    pub(super) fn has_conflict(
        &self,
        person: PersonId,
        candidate_session: SessionId,
        candidate: Option<Span>,
    ) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        self.enrolled
            .get(&person)
            .is_some_and(|entry| conflicts_with(&entry, candidate_session, &candidate))
    }
}
