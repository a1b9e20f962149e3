//! Seat admission: given one (person, action) request against a session's
//! current ledger, decide what happens. Pure decision logic — the batch
//! orchestrator persists the resulting event.

use ulid::Ulid;

use crate::model::*;

use super::Engine;

/// What to do for one request. `Admit` carries the event to persist plus the
/// caller-facing outcome; `Reject` is a per-person validation failure that
/// does not abort the batch.
pub(super) enum Decision {
    Admit {
        event: Event,
        outcome: Outcome,
        /// True when the event frees an enrolled seat (cancel of an Enrolled
        /// row), so the orchestrator knows a promotion pass is due.
        vacated_seat: bool,
    },
    Reject(RejectReason),
}

impl Engine {
    /// Decide one request against the locked session state.
    ///
    /// Enroll: dup live row rejects; a schedule clash sends the person to the
    /// waitlist rather than rejecting them; a full session likewise. Waitlist:
    /// explicit queue entry, conflicts don't matter until promotion. Cancel:
    /// flips the live row, whatever its status.
    pub(super) fn decide(
        &self,
        rs: &SessionState,
        person: PersonId,
        action: Action,
        now: Ms,
    ) -> Decision {
        match action {
            Action::Enroll => {
                if let Some(row) = rs.live(person) {
                    let reason = match row.status {
                        ParticipationStatus::Enrolled => RejectReason::AlreadyEnrolled,
                        ParticipationStatus::Waiting => RejectReason::AlreadyWaiting,
                        ParticipationStatus::Cancelled => unreachable!("live row is never cancelled"),
                    };
                    return Decision::Reject(reason);
                }
                if self.has_conflict(person, rs.id, rs.span) {
                    return self.admit_waiting(rs, person, now, WaitlistReason::TimeConflict);
                }
                if rs.enrolled_count() < rs.capacity as usize {
                    Decision::Admit {
                        event: Event::Enrolled {
                            id: Ulid::new(),
                            session_id: rs.id,
                            person_id: person,
                            seq: self.take_seq(),
                            at: now,
                        },
                        outcome: Outcome::Enrolled,
                        vacated_seat: false,
                    }
                } else {
                    self.admit_waiting(rs, person, now, WaitlistReason::Full)
                }
            }
            Action::Waitlist => {
                if let Some(row) = rs.live(person) {
                    let reason = match row.status {
                        ParticipationStatus::Enrolled => RejectReason::AlreadyEnrolled,
                        ParticipationStatus::Waiting => RejectReason::AlreadyWaiting,
                        ParticipationStatus::Cancelled => unreachable!("live row is never cancelled"),
                    };
                    return Decision::Reject(reason);
                }
                self.admit_waiting(rs, person, now, WaitlistReason::Requested)
            }
            Action::Cancel => match rs.live(person) {
                None => Decision::Reject(RejectReason::NotParticipating),
                Some(row) => Decision::Admit {
                    event: Event::Cancelled {
                        id: row.id,
                        session_id: rs.id,
                        at: now,
                    },
                    outcome: Outcome::Cancelled,
                    vacated_seat: row.status == ParticipationStatus::Enrolled,
                },
            },
        }
    }

    fn admit_waiting(
        &self,
        rs: &SessionState,
        person: PersonId,
        now: Ms,
        reason: WaitlistReason,
    ) -> Decision {
        Decision::Admit {
            event: Event::Waitlisted {
                id: Ulid::new(),
                session_id: rs.id,
                person_id: person,
                seq: self.take_seq(),
                at: now,
            },
            outcome: Outcome::Waitlisted { reason },
            vacated_seat: false,
        }
    }
}
