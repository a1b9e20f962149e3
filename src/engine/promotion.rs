//! Waitlist promotion. Runs after every cancellation that frees an enrolled
//! seat and after any capacity raise: walks the waitlist in seq order,
//! promotes the earliest non-conflicted candidates into the free seats, and
//! skips conflicted candidates without consuming a seat or their queue spot.

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Fill free seats from the waitlist. The caller holds the session's write
    /// lock. Each promotion is persisted and applied before the next candidate
    /// is considered, so conflict checks see seats already granted this pass.
    pub(super) async fn promote_waiting(
        &self,
        rs: &mut SessionState,
        now: Ms,
    ) -> Result<Vec<Promotion>, EngineError> {
        let mut promoted = Vec::new();

        loop {
            let free = (rs.capacity as usize).saturating_sub(rs.enrolled_count());
            if free == 0 {
                break;
            }

            // Earliest waiting candidate the conflict check lets through.
            // Conflicted candidates keep their queue spot for a later pass.
            let candidate = rs
                .waiting_in_order()
                .find(|row| !self.has_conflict(row.person_id, rs.id, rs.span))
                .map(|row| (row.id, row.person_id));

            let Some((row_id, person)) = candidate else {
                break;
            };

            let event = Event::Promoted {
                id: row_id,
                session_id: rs.id,
                at: now,
            };
            self.persist_and_apply(rs.id, rs, &event).await?;
            metrics::counter!(crate::observability::PROMOTIONS_TOTAL).increment(1);
            tracing::debug!(session = %rs.id, person = %person, "promoted from waitlist");

            promoted.push(Promotion {
                person_id: person,
                participation: row_id,
            });
        }

        Ok(promoted)
    }

    /// Explicit promotion sweep for one session. Called by operators after a
    /// capacity raise, or when an external conflict went away (a clashing
    /// session was rescheduled).
    pub async fn run_promotions(&self, session: SessionId) -> Result<Vec<Promotion>, EngineError> {
        let rs = self
            .get_session(&session)
            .ok_or(EngineError::NotFound(session))?;
        let mut guard = rs.write().await;
        let now = super::conflict::now_ms();
        self.promote_waiting(&mut guard, now).await
    }
}
