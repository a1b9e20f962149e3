use std::path::PathBuf;
use std::sync::Arc;

use ulid::Ulid;

use rollcall::calendar::WindowTable;
use rollcall::directory::InMemoryDirectory;
use rollcall::engine::{Engine, EngineError};
use rollcall::model::{ParticipationStatus, PersonId};
use rollcall::notify::NotifyHub;
use rollcall::{Action, Outcome, RejectReason, Span, WaitlistReason};

const H: i64 = 3_600_000; // 1 hour in ms

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rollcall_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// A full signup day for a two-track event: a family enrolls across
/// overlapping sessions, hits capacity, queues, cancels, and the waitlist
/// backfills — then the whole thing survives a restart.
#[tokio::test]
async fn family_signup_day() {
    let path = test_wal_path("family_signup.wal");
    let now = now_ms();

    let directory = Arc::new(InMemoryDirectory::new());
    let parent = Ulid::new();
    let kid = Ulid::new();
    directory.register_account(parent, Some(0)).unwrap();
    directory.register_dependent(kid, parent, None).unwrap();

    let windows = Arc::new(WindowTable::new());
    let engine = Engine::new(
        path.clone(),
        directory.clone(),
        windows.clone(),
        Arc::new(NotifyHub::new()),
    )
    .unwrap();

    // Two overlapping morning tracks plus an afternoon slot
    let morning_a = Ulid::new();
    let morning_b = Ulid::new();
    let afternoon = Ulid::new();
    engine
        .create_session(morning_a, 2, Some(Span::new(now, now + 2 * H)))
        .await
        .unwrap();
    engine
        .create_session(morning_b, 1, Some(Span::new(now + H, now + 3 * H)))
        .await
        .unwrap();
    engine
        .create_session(afternoon, 1, Some(Span::new(now + 4 * H, now + 5 * H)))
        .await
        .unwrap();

    // Nothing moves before signups open
    let early = engine
        .submit(parent, morning_a, &[(parent, Action::Enroll)])
        .await;
    assert!(matches!(early, Err(EngineError::EnrollmentClosed(_))));

    for sid in [morning_a, morning_b, afternoon] {
        windows.set_window(sid, Span::new(now - H, now + 24 * H));
    }

    // Parent takes both family seats in morning_a
    let result = engine
        .submit(
            parent,
            morning_a,
            &[(parent, Action::Enroll), (kid, Action::Enroll)],
        )
        .await
        .unwrap();
    assert_eq!(result.outcome_for(parent), Some(Outcome::Enrolled));
    assert_eq!(result.outcome_for(kid), Some(Outcome::Enrolled));

    // morning_b clashes with the seat the parent already holds
    let result = engine
        .submit(parent, morning_b, &[(parent, Action::Enroll)])
        .await
        .unwrap();
    assert_eq!(
        result.outcome_for(parent),
        Some(Outcome::Waitlisted {
            reason: WaitlistReason::TimeConflict
        })
    );

    // A stranger fills morning_b; another queues behind the parent
    let stranger = Ulid::new();
    let latecomer = Ulid::new();
    engine
        .submit(stranger, morning_b, &[(stranger, Action::Enroll)])
        .await
        .unwrap();
    let result = engine
        .submit(latecomer, morning_b, &[(latecomer, Action::Enroll)])
        .await
        .unwrap();
    assert_eq!(
        result.outcome_for(latecomer),
        Some(Outcome::Waitlisted {
            reason: WaitlistReason::Full
        })
    );

    // Parent bails out of morning_a. The freed seat belongs to morning_a's
    // own queue (empty), not morning_b's — nothing promotes yet.
    let result = engine
        .submit(parent, morning_a, &[(parent, Action::Cancel)])
        .await
        .unwrap();
    assert!(result.promoted.is_empty());

    // The stranger leaves morning_b. Its queue holds [parent, latecomer];
    // the parent no longer clashes, so the parent gets the seat.
    let result = engine
        .submit(stranger, morning_b, &[(stranger, Action::Cancel)])
        .await
        .unwrap();
    assert_eq!(result.promoted.len(), 1);
    assert_eq!(result.promoted[0].person_id, parent);

    // Afternoon is clear of everything
    let result = engine
        .submit(parent, afternoon, &[(parent, Action::Enroll)])
        .await
        .unwrap();
    assert_eq!(result.outcome_for(parent), Some(Outcome::Enrolled));

    // Double-submitting the afternoon batch is a no-op
    let replay = engine
        .submit(parent, afternoon, &[(parent, Action::Enroll)])
        .await
        .unwrap();
    assert_eq!(
        replay.outcome_for(parent),
        Some(Outcome::Rejected {
            reason: RejectReason::AlreadyEnrolled
        })
    );

    drop(engine);

    // Restart: the ledger, queue order, and conflict index all come back
    let engine = Engine::new(
        path,
        directory,
        windows.clone(),
        Arc::new(NotifyHub::new()),
    )
    .unwrap();

    assert_eq!(engine.enrolled_count(morning_a).await.unwrap(), 1); // kid
    assert_eq!(engine.enrolled_count(morning_b).await.unwrap(), 1); // parent
    assert_eq!(engine.enrolled_count(afternoon).await.unwrap(), 1); // parent

    let kid_row = engine
        .live_participation(morning_a, kid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kid_row.status, ParticipationStatus::Enrolled);

    let waiting = engine.waiting_in_order(morning_b).await.unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].person_id, latecomer);

    // The restarted engine still sees the parent's morning_b seat when
    // checking a new overlapping session
    let clash = Ulid::new();
    engine
        .create_session(clash, 5, Some(Span::new(now + H, now + 2 * H)))
        .await
        .unwrap();
    windows.set_window(clash, Span::new(now - H, now + 24 * H));
    let result = engine
        .submit(parent, clash, &[(parent, Action::Enroll)])
        .await
        .unwrap();
    assert_eq!(
        result.outcome_for(parent),
        Some(Outcome::Waitlisted {
            reason: WaitlistReason::TimeConflict
        })
    );
}

/// Heavy churn on one session never over-fills it, and the queue drains in
/// strict arrival order.
#[tokio::test]
async fn churn_preserves_capacity_and_order() {
    let engine = Arc::new(
        Engine::new(
            test_wal_path("churn.wal"),
            Arc::new(InMemoryDirectory::new()),
            Arc::new(rollcall::calendar::AlwaysOpen),
            Arc::new(NotifyHub::new()),
        )
        .unwrap(),
    );

    let sid = Ulid::new();
    let now = now_ms();
    engine
        .create_session(sid, 3, Some(Span::new(now, now + H)))
        .await
        .unwrap();

    let people: Vec<PersonId> = (0..10).map(|_| Ulid::new()).collect();
    let mut handles = Vec::new();
    for person in people.clone() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .submit(person, sid, &[(person, Action::Enroll)])
                .await
                .unwrap()
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(engine.enrolled_count(sid).await.unwrap(), 3);
    assert_eq!(engine.waiting_in_order(sid).await.unwrap().len(), 7);

    // The original three seat holders all leave; the first three waiting
    // take their seats, in arrival order
    let expected_next: Vec<PersonId> = engine
        .waiting_in_order(sid)
        .await
        .unwrap()
        .iter()
        .take(3)
        .map(|p| p.person_id)
        .collect();

    let mut seat_holders = Vec::new();
    for person in &people {
        if let Some(row) = engine.live_participation(sid, *person).await.unwrap()
            && row.status == ParticipationStatus::Enrolled
        {
            seat_holders.push(*person);
        }
    }
    assert_eq!(seat_holders.len(), 3);

    let mut promoted = Vec::new();
    for person in seat_holders {
        let result = engine
            .submit(person, sid, &[(person, Action::Cancel)])
            .await
            .unwrap();
        promoted.extend(result.promoted.iter().map(|p| p.person_id));
    }

    assert_eq!(promoted, expected_next);
    assert_eq!(engine.enrolled_count(sid).await.unwrap(), 3);
}
