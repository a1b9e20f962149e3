//! Batch orchestration. One actor submits requests for themselves and their
//! dependents against a single session; the whole batch runs under the
//! session's write lock, so observers never see a half-applied batch.
//! Per-person failures are reported as Rejected outcomes, not batch errors.

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::admission::Decision;
use super::conflict::now_ms;
use super::{Engine, EngineError};

impl Engine {
    /// Submit a batch of (person, action) requests for one session.
    ///
    /// Succeeds per person: an outcome is returned for every request, in input
    /// order, and a Rejected outcome for one person never blocks the others.
    /// Batch-level preconditions (empty batch, closed window, unmanaged
    /// person, unscheduled session) fail the whole batch before any write.
    /// Re-submitting an applied batch is harmless: every request is rejected
    /// as a duplicate and no new rows appear.
    pub async fn submit(
        &self,
        actor: PersonId,
        session: SessionId,
        requests: &[(PersonId, Action)],
    ) -> Result<BatchResult, EngineError> {
        let start = std::time::Instant::now();
        let result = self.submit_inner(actor, session, requests).await;

        let status = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_retryable() => "retryable",
            Err(_) => "error",
        };
        metrics::counter!(observability::BATCHES_TOTAL, "status" => status).increment(1);
        metrics::histogram!(observability::BATCH_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());

        result
    }

    async fn submit_inner(
        &self,
        actor: PersonId,
        session: SessionId,
        requests: &[(PersonId, Action)],
    ) -> Result<BatchResult, EngineError> {
        if requests.is_empty() {
            return Err(EngineError::EmptyBatch);
        }
        if requests.len() > MAX_BATCH_SIZE {
            return Err(EngineError::LimitExceeded("batch too large"));
        }

        let now = now_ms();
        if !self.calendar.is_enrollment_open(session, now) {
            return Err(EngineError::EnrollmentClosed(session));
        }

        // Every target must be the actor or one of their dependents. An
        // out-of-household person fails the whole batch, not just their row.
        let household = self.directory.dependents_of(actor);
        for (person, _) in requests {
            if *person != actor && !household.contains(person) {
                return Err(EngineError::NotManagedByActor {
                    actor,
                    person: *person,
                });
            }
        }

        let rs = self
            .get_session(&session)
            .ok_or(EngineError::NotFound(session))?;
        let mut guard = rs.write().await;

        // An unscheduled session takes no new participants. Cancels still
        // work so people can leave a session that lost its slot.
        if guard.span.is_none() && requests.iter().any(|(_, a)| *a != Action::Cancel) {
            return Err(EngineError::Unscheduled(session));
        }

        if guard.ledger.len() + requests.len() > MAX_LEDGER_ROWS_PER_SESSION {
            return Err(EngineError::LimitExceeded("session ledger full"));
        }

        let mut outcomes = Vec::with_capacity(requests.len());
        let mut seats_vacated = false;

        for &(person, action) in requests {
            match self.decide(&guard, person, action, now) {
                Decision::Admit {
                    event,
                    outcome,
                    vacated_seat,
                } => {
                    self.persist_and_apply(session, &mut guard, &event).await?;
                    seats_vacated |= vacated_seat;
                    record_outcome(&outcome);
                    outcomes.push((person, outcome));
                }
                Decision::Reject(reason) => {
                    metrics::counter!(
                        observability::REJECTIONS_TOTAL,
                        "reason" => reject_label(reason)
                    )
                    .increment(1);
                    outcomes.push((person, Outcome::Rejected { reason }));
                }
            }
        }

        let promoted = if seats_vacated {
            self.promote_waiting(&mut guard, now).await?
        } else {
            Vec::new()
        };

        // Seat accounting must close balanced. A breach here is state
        // corruption, not contention — surface it loudly.
        let enrolled = guard.enrolled_count();
        if enrolled > guard.capacity as usize {
            metrics::counter!(observability::CAPACITY_BREACHES_TOTAL).increment(1);
            tracing::error!(
                session = %session,
                enrolled,
                capacity = guard.capacity,
                "capacity invariant breached after batch"
            );
            return Err(EngineError::CapacityBreached {
                session,
                enrolled,
                capacity: guard.capacity,
            });
        }

        Ok(BatchResult { outcomes, promoted })
    }
}

fn record_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Enrolled => {
            metrics::counter!(observability::ENROLLMENTS_TOTAL).increment(1);
        }
        Outcome::Waitlisted { reason } => {
            metrics::counter!(
                observability::WAITLISTED_TOTAL,
                "reason" => waitlist_label(*reason)
            )
            .increment(1);
        }
        Outcome::Cancelled => {
            metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        }
        Outcome::Rejected { .. } => {}
    }
}

fn waitlist_label(reason: WaitlistReason) -> &'static str {
    match reason {
        WaitlistReason::Requested => "requested",
        WaitlistReason::Full => "full",
        WaitlistReason::TimeConflict => "time_conflict",
    }
}

fn reject_label(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::AlreadyEnrolled => "already_enrolled",
        RejectReason::AlreadyWaiting => "already_waiting",
        RejectReason::NotParticipating => "not_participating",
    }
}
