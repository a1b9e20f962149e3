use crate::model::*;

use super::{Engine, EngineError, SharedSessionState};

impl Engine {
    pub async fn enrolled_count(&self, session: SessionId) -> Result<usize, EngineError> {
        let rs = self
            .get_session(&session)
            .ok_or(EngineError::NotFound(session))?;
        let guard = rs.read().await;
        Ok(guard.enrolled_count())
    }

    /// The waitlist in promotion order.
    pub async fn waiting_in_order(
        &self,
        session: SessionId,
    ) -> Result<Vec<Participation>, EngineError> {
        let rs = self
            .get_session(&session)
            .ok_or(EngineError::NotFound(session))?;
        let guard = rs.read().await;
        Ok(guard.waiting_in_order().cloned().collect())
    }

    /// The person's live row in a session, if any.
    pub async fn live_participation(
        &self,
        session: SessionId,
        person: PersonId,
    ) -> Result<Option<Participation>, EngineError> {
        let rs = self
            .get_session(&session)
            .ok_or(EngineError::NotFound(session))?;
        let guard = rs.read().await;
        Ok(guard.live(person).cloned())
    }

    /// Full ledger for a session, cancelled history included, ascending seq.
    pub async fn roster(&self, session: SessionId) -> Result<Vec<Participation>, EngineError> {
        let rs = self
            .get_session(&session)
            .ok_or(EngineError::NotFound(session))?;
        let guard = rs.read().await;
        Ok(guard.ledger.clone())
    }

    /// Every row the person holds across all sessions, cancelled history
    /// included, ascending seq. Waits out in-flight batches rather than
    /// racing them.
    pub async fn participations_of(&self, person: PersonId) -> Vec<Participation> {
        let mut rows = Vec::new();
        for rs in self.snapshot_sessions() {
            let guard = rs.read().await;
            rows.extend(
                guard
                    .ledger
                    .iter()
                    .filter(|p| p.person_id == person)
                    .cloned(),
            );
        }
        rows.sort_by_key(|p| p.seq);
        rows
    }

    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.snapshot_sessions();
        let mut infos = Vec::with_capacity(sessions.len());
        for rs in sessions {
            let guard = rs.read().await;
            infos.push(SessionInfo {
                id: guard.id,
                capacity: guard.capacity,
                span: guard.span,
                enrolled: guard.enrolled_count(),
                waiting: guard.waiting_in_order().count(),
            });
        }
        infos
    }

    /// Clone the session Arcs out of the map before locking anything, so no
    /// map shard guard is held across an await.
    pub(super) fn snapshot_sessions(&self) -> Vec<SharedSessionState> {
        self.state.iter().map(|e| e.value().clone()).collect()
    }

    /// Sessions where the person currently holds a seat, with their spans.
    pub fn enrolled_sessions(&self, person: PersonId) -> Vec<(SessionId, Span)> {
        self.enrolled
            .get(&person)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}
