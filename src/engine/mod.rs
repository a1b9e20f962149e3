mod admission;
mod batch;
mod conflict;
mod error;
mod mutations;
mod promotion;
mod queries;

pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::calendar::EnrollmentCalendar;
use crate::directory::PersonDirectory;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedSessionState = Arc<RwLock<SessionState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(
    batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>,
    result: &io::Result<()>,
) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

pub struct Engine {
    pub state: DashMap<SessionId, SharedSessionState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub directory: Arc<dyn PersonDirectory>,
    pub calendar: Arc<dyn EnrollmentCalendar>,
    /// Next ledger sequence number. Engine-global so waitlist order is total
    /// across re-joins; gaps (e.g. after a failed WAL append) are fine.
    pub(super) next_seq: AtomicU64,
    /// Person → enrolled (session, span) pairs, for cross-session conflict
    /// checks without taking a second session lock. Only Enrolled rows of
    /// scheduled sessions appear here. Stale reads fail safe: a just-cancelled
    /// enrollment at worst sends the candidate to the waitlist, where the
    /// promotion pass re-checks.
    pub(super) enrolled: DashMap<PersonId, Vec<(SessionId, Span)>>,
}

/// Apply an event directly to a SessionState (no locking — caller holds the
/// lock) and keep the enrolled index in step.
fn apply_to_session(
    rs: &mut SessionState,
    event: &Event,
    enrolled: &DashMap<PersonId, Vec<(SessionId, Span)>>,
) {
    match event {
        Event::Enrolled {
            id,
            session_id,
            person_id,
            seq,
            at,
        } => {
            rs.push_row(Participation {
                id: *id,
                person_id: *person_id,
                session_id: *session_id,
                status: ParticipationStatus::Enrolled,
                seq: *seq,
                updated_at: *at,
            });
            if let Some(span) = rs.span {
                index_add(enrolled, *person_id, *session_id, span);
            }
        }
        Event::Waitlisted {
            id,
            session_id,
            person_id,
            seq,
            at,
        } => {
            rs.push_row(Participation {
                id: *id,
                person_id: *person_id,
                session_id: *session_id,
                status: ParticipationStatus::Waiting,
                seq: *seq,
                updated_at: *at,
            });
        }
        Event::Cancelled { id, session_id, at } => {
            if let Some(row) = rs.row_mut(*id) {
                let was_enrolled = row.status == ParticipationStatus::Enrolled;
                let person = row.person_id;
                row.status = ParticipationStatus::Cancelled;
                row.updated_at = *at;
                if was_enrolled {
                    index_remove(enrolled, person, *session_id);
                }
            }
        }
        Event::Promoted { id, session_id, at } => {
            if let Some(row) = rs.row_mut(*id) {
                row.status = ParticipationStatus::Enrolled;
                row.updated_at = *at;
                let person = row.person_id;
                if let Some(span) = rs.span {
                    index_add(enrolled, person, *session_id, span);
                }
            }
        }
        Event::SessionUpdated { id, capacity, span } => {
            rs.capacity = *capacity;
            rs.span = *span;
            // Reindex every enrolled row under the new schedule
            for row in &rs.ledger {
                if row.status == ParticipationStatus::Enrolled {
                    index_remove(enrolled, row.person_id, *id);
                    if let Some(span) = *span {
                        index_add(enrolled, row.person_id, *id, span);
                    }
                }
            }
        }
        // SessionCreated is handled at the DashMap level, not here
        Event::SessionCreated { .. } => {}
    }
}

fn index_add(
    enrolled: &DashMap<PersonId, Vec<(SessionId, Span)>>,
    person: PersonId,
    session: SessionId,
    span: Span,
) {
    let mut entry = enrolled.entry(person).or_default();
    entry.retain(|(s, _)| *s != session);
    entry.push((session, span));
}

fn index_remove(
    enrolled: &DashMap<PersonId, Vec<(SessionId, Span)>>,
    person: PersonId,
    session: SessionId,
) {
    if let Some(mut entry) = enrolled.get_mut(&person) {
        entry.retain(|(s, _)| *s != session);
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        directory: Arc<dyn PersonDirectory>,
        calendar: Arc<dyn EnrollmentCalendar>,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            notify,
            directory,
            calendar,
            next_seq: AtomicU64::new(1),
            enrolled: DashMap::new(),
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        let mut max_seq = 0u64;
        for event in &events {
            match event {
                Event::SessionCreated { id, capacity, span } => {
                    let rs = SessionState::new(*id, *capacity, *span);
                    engine.state.insert(*id, Arc::new(RwLock::new(rs)));
                }
                other => {
                    if let Some(seq) = event_seq(other) {
                        max_seq = max_seq.max(seq);
                    }
                    if let Some(session_id) = event_session_id(other)
                        && let Some(entry) = engine.state.get(&session_id)
                    {
                        let rs_arc = entry.clone();
                        let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                        apply_to_session(&mut guard, other, &engine.enrolled);
                    }
                }
            }
        }
        engine.next_seq.store(max_seq + 1, Ordering::Relaxed);

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub fn get_session(&self, id: &SessionId) -> Option<SharedSessionState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub(super) fn take_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// WAL-append + apply + notify in one call.
    pub(super) async fn persist_and_apply(
        &self,
        session_id: SessionId,
        rs: &mut SessionState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_session(rs, event, &self.enrolled);
        self.notify.send(session_id, event);
        Ok(())
    }
}

fn event_session_id(event: &Event) -> Option<SessionId> {
    match event {
        Event::Enrolled { session_id, .. }
        | Event::Waitlisted { session_id, .. }
        | Event::Cancelled { session_id, .. }
        | Event::Promoted { session_id, .. } => Some(*session_id),
        Event::SessionUpdated { id, .. } => Some(*id),
        Event::SessionCreated { .. } => None,
    }
}

fn event_seq(event: &Event) -> Option<u64> {
    match event {
        Event::Enrolled { seq, .. } | Event::Waitlisted { seq, .. } => Some(*seq),
        _ => None,
    }
}
