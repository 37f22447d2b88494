use chrono::{Duration, NaiveDate, Utc};

use cdp_missions_backend::{
    models::{
        mission::{ControlReason, Mission, MissionStatus, MissionType},
        session::{Session, VerifiedSubject},
        user::{User, UserRole},
    },
    repositories::{MissionRepository, Repository, UserRepository},
    services::{AttemptStore, PgAttemptStore, PgSessionStore, SessionStore},
    types::MissionId,
};

mod support;

use support::{integration_guard, test_pool};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn mission(reference: &str, start: NaiveDate, end: NaiveDate, status: MissionStatus) -> Mission {
    let now = Utc::now();
    Mission {
        id: MissionId::new(),
        reference: reference.to_string(),
        title: "Contrôle".into(),
        description: "Vérification".into(),
        mission_type: MissionType::OnDocuments,
        organization: "Opérateur".into(),
        address: "Dakar".into(),
        start_date: start,
        end_date: end,
        status,
        control_reason: ControlReason::Complaint,
        decision_number: None,
        decision_date: None,
        team_members: vec!["M. Fall".into()],
        objectives: Vec::new(),
        assigned_to: None,
        created_by: None,
        ignore_auto_status_change: false,
        created_at: now,
        updated_at: now,
    }
}

/// Applies in-memory transitions until none is due, as one advance pass does.
fn settled_status(mission: &Mission, today: NaiveDate) -> MissionStatus {
    let mut mission = mission.clone();
    while let Some(next) = mission.scheduled_transition(today) {
        mission.status = next;
    }
    mission.status
}

fn unique_reference() -> String {
    format!("T-{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

#[tokio::test]
async fn pg_attempt_store_locks_at_threshold_and_resets_after_expiry() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let store = PgAttemptStore::new(pool);
    let identifier = format!("{}@cdp.sn", uuid::Uuid::new_v4());
    let now = Utc::now();
    let lock_until = now + Duration::minutes(15);

    let first = store
        .record_failure(&identifier, now, 3, lock_until)
        .await
        .expect("first failure");
    assert_eq!(first.failure_count, 1);
    assert!(first.locked_until.is_none());

    store.record_failure(&identifier, now, 3, lock_until).await.expect("second");
    let third = store
        .record_failure(&identifier, now, 3, lock_until)
        .await
        .expect("third");
    assert_eq!(third.failure_count, 3);
    assert!(third.is_locked_at(now));

    let fourth = store
        .record_failure(&identifier, now, 3, now + Duration::hours(1))
        .await
        .expect("fourth");
    assert_eq!(fourth.locked_until, third.locked_until);

    let later = lock_until + Duration::seconds(1);
    assert!(store.clear_expired(&identifier, later).await.expect("clear expired"));
    assert!(store.get(&identifier).await.expect("get").is_none());

    let fresh = store
        .record_failure(&identifier, later, 3, later + Duration::minutes(15))
        .await
        .expect("fresh failure");
    assert_eq!(fresh.failure_count, 1);
    assert!(store.clear(&identifier).await.expect("clear"));
    assert!(!store.clear(&identifier).await.expect("clear again"));
}

#[tokio::test]
async fn pg_session_store_keeps_one_session_per_subject() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let user = User::new(
        &format!("{}@cdp.sn", uuid::Uuid::new_v4()),
        "Session".into(),
        UserRole::Supervisor,
        "unused-hash".into(),
        String::new(),
        String::new(),
    );
    let user = UserRepository::new()
        .create(&pool, &user)
        .await
        .expect("seed user");
    let subject: VerifiedSubject = user.to_subject();
    let store = PgSessionStore::new(pool);

    let first = Session::issue(subject.clone(), Utc::now(), Duration::hours(1));
    let second = Session::issue(subject, Utc::now(), Duration::hours(1));
    store.put(&first).await.expect("put first");
    store.put(&second).await.expect("put second");

    assert!(store.get(&first.token).await.expect("get first").is_none());
    let loaded = store
        .get(&second.token)
        .await
        .expect("get second")
        .expect("second session stored");
    assert_eq!(loaded.subject.role, UserRole::Supervisor);
    assert_eq!(loaded.subject.id, user.id);

    assert_eq!(store.remove_for_subject(user.id).await.expect("revoke"), 1);
    assert!(!store.remove(&second.token).await.expect("remove"));
}

#[tokio::test]
async fn advance_statuses_moves_planned_missions_along() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let repo = MissionRepository::new();
    let now = date(2031, 3, 10)
        .and_hms_opt(6, 30, 0)
        .expect("valid time")
        .and_utc();
    let today = now.date_naive();

    let upcoming = repo
        .create(
            &pool,
            &mission(&unique_reference(), date(2031, 3, 12), date(2031, 3, 14), MissionStatus::Planned),
        )
        .await
        .expect("upcoming");
    let started = repo
        .create(
            &pool,
            &mission(&unique_reference(), date(2031, 3, 9), date(2031, 3, 11), MissionStatus::Planned),
        )
        .await
        .expect("started");
    let finished = repo
        .create(
            &pool,
            &mission(&unique_reference(), date(2031, 3, 1), date(2031, 3, 5), MissionStatus::Planned),
        )
        .await
        .expect("finished");
    let mut pinned = mission(&unique_reference(), date(2031, 3, 1), date(2031, 3, 5), MissionStatus::Planned);
    pinned.ignore_auto_status_change = true;
    let pinned = repo.create(&pool, &pinned).await.expect("pinned");
    let cancelled = repo
        .create(
            &pool,
            &mission(&unique_reference(), date(2031, 3, 1), date(2031, 3, 5), MissionStatus::Cancelled),
        )
        .await
        .expect("cancelled");

    let report = repo.advance_statuses(&pool, now).await.expect("advance");
    assert!(report.started >= 2);
    assert!(report.completed >= 1);

    let before = [upcoming, started, finished, pinned, cancelled];
    for original in &before {
        let reloaded = repo.find_by_id(&pool, original.id).await.expect("reload");
        assert_eq!(
            reloaded.status,
            settled_status(original, today),
            "mission {}",
            original.reference
        );
        if reloaded.status != original.status {
            assert_eq!(reloaded.updated_at, now);
        }
    }
    assert_eq!(
        repo.find_by_id(&pool, before[2].id).await.expect("reload").status,
        MissionStatus::Completed
    );

    for mission in &before {
        repo.delete(&pool, mission.id).await.expect("cleanup");
    }
}
