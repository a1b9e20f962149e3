use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tokio::sync::{RwLock, oneshot};

use crate::limits::*;
use crate::model::*;

use super::conflict::validate_span;
use super::{Engine, EngineError, WalCommand};

impl Engine {
    pub async fn create_session(
        &self,
        id: SessionId,
        capacity: u32,
        span: Option<Span>,
    ) -> Result<(), EngineError> {
        if self.state.len() >= MAX_SESSIONS {
            return Err(EngineError::LimitExceeded("too many sessions"));
        }
        if capacity == 0 {
            return Err(EngineError::InvalidCapacity(capacity));
        }
        if capacity > MAX_CAPACITY {
            return Err(EngineError::LimitExceeded("capacity too large"));
        }
        if let Some(span) = &span {
            validate_span(span)?;
        }
        // Reserve the id atomically with the duplicate check, then make it
        // durable. Two racing creates with the same id must never both win.
        let rs = Arc::new(RwLock::new(SessionState::new(id, capacity, span)));
        match self.state.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(vacant) => {
                vacant.insert(rs);
            }
        }

        let event = Event::SessionCreated { id, capacity, span };
        if let Err(e) = self.wal_append(&event).await {
            self.state.remove(&id);
            return Err(e);
        }
        self.notify.send(id, &event);
        Ok(())
    }

    /// Change a session's capacity or schedule.
    ///
    /// Capacity may never drop below the current enrolled count, and the
    /// schedule may not be cleared while anyone holds a live row. Raising
    /// capacity does not promote by itself — run `run_promotions` afterwards.
    pub async fn update_session(
        &self,
        id: SessionId,
        capacity: u32,
        span: Option<Span>,
    ) -> Result<(), EngineError> {
        if capacity == 0 {
            return Err(EngineError::InvalidCapacity(capacity));
        }
        if capacity > MAX_CAPACITY {
            return Err(EngineError::LimitExceeded("capacity too large"));
        }
        if let Some(span) = &span {
            validate_span(span)?;
        }
        let rs = self.get_session(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;

        let enrolled = guard.enrolled_count();
        if (capacity as usize) < enrolled {
            return Err(EngineError::CapacityBelowEnrolled {
                session: id,
                enrolled,
            });
        }
        if span.is_none() && guard.ledger.iter().any(|p| p.is_live()) {
            return Err(EngineError::ScheduleInUse(id));
        }

        let event = Event::SessionUpdated { id, capacity, span };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state: one SessionCreated per session plus the
    /// ledger replayed status by status.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for rs in self.snapshot_sessions() {
            let guard = rs.read().await;

            events.push(Event::SessionCreated {
                id: guard.id,
                capacity: guard.capacity,
                span: guard.span,
            });

            for row in &guard.ledger {
                match row.status {
                    ParticipationStatus::Enrolled => events.push(Event::Enrolled {
                        id: row.id,
                        session_id: guard.id,
                        person_id: row.person_id,
                        seq: row.seq,
                        at: row.updated_at,
                    }),
                    ParticipationStatus::Waiting => events.push(Event::Waitlisted {
                        id: row.id,
                        session_id: guard.id,
                        person_id: row.person_id,
                        seq: row.seq,
                        at: row.updated_at,
                    }),
                    // A cancelled row stays in the ledger for idempotence
                    // history; re-emit it as a waitlist entry plus cancel.
                    ParticipationStatus::Cancelled => {
                        events.push(Event::Waitlisted {
                            id: row.id,
                            session_id: guard.id,
                            person_id: row.person_id,
                            seq: row.seq,
                            at: row.updated_at,
                        });
                        events.push(Event::Cancelled {
                            id: row.id,
                            session_id: guard.id,
                            at: row.updated_at,
                        });
                    }
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
