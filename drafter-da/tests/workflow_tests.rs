//! Session State Machine Tests
//! Test File: workflow_tests.rs
//! Requirements: DA-WF-010 (State Machine), DA-WF-020 (Progress), DA-WF-030 (Session Store)

use drafter_da::models::{AnalysisSession, AnalysisStatus, AnalysisType};
use drafter_da::sessions::{MemorySessionStore, SessionStore};
use uuid::Uuid;

/// Helper function to create test session
fn create_test_session() -> AnalysisSession {
    AnalysisSession::new(
        "plan.dxf".to_string(),
        "dxf".to_string(),
        2048,
        AnalysisType::Standard,
    )
}

/// TC-WF-001: CREATED → PROCESSING Transition
/// **Requirement:** DA-WF-010 | **Type:** Unit | **Priority:** P0
#[test]
fn tc_wf_001_created_to_processing() {
    // Given: New session in CREATED state
    let mut session = create_test_session();
    assert_eq!(session.status, AnalysisStatus::Created);
    assert_eq!(session.progress, 0);

    // When: Pipeline accepts the upload
    let transition = session
        .transition_to(AnalysisStatus::Processing)
        .expect("non-terminal session must transition");

    // Then: Session transitions to PROCESSING
    assert_eq!(session.status, AnalysisStatus::Processing);
    assert_eq!(transition.old_status, AnalysisStatus::Created);
    assert_eq!(transition.new_status, AnalysisStatus::Processing);
}

/// TC-WF-002: PROCESSING → COMPLETED Transition
/// **Requirement:** DA-WF-010 | **Type:** Unit | **Priority:** P0
#[test]
fn tc_wf_002_processing_to_completed() {
    // Given: Session in PROCESSING state
    let mut session = create_test_session();
    session.transition_to(AnalysisStatus::Processing);
    session.set_progress(90, "Rendering thumbnail");

    // When: Result assembly finishes
    let transition = session.complete().expect("completion from PROCESSING");

    // Then: Terminal COMPLETED with 100% progress and an end timestamp
    assert_eq!(transition.new_status, AnalysisStatus::Completed);
    assert_eq!(session.status, AnalysisStatus::Completed);
    assert_eq!(session.progress, 100);
    assert!(session.ended_at.is_some());
    assert!(session.status.is_terminal());
}

/// TC-WF-003: PROCESSING → FAILED records the error
/// **Requirement:** DA-WF-010 | **Type:** Unit | **Priority:** P0
#[test]
fn tc_wf_003_processing_to_failed() {
    // Given: Session in PROCESSING state
    let mut session = create_test_session();
    session.transition_to(AnalysisStatus::Processing);

    // When: The parse stage errors
    let transition = session
        .fail("File processing error: truncated STL body")
        .expect("failure from PROCESSING");

    // Then: Terminal FAILED with the error stored
    assert_eq!(transition.new_status, AnalysisStatus::Failed);
    assert_eq!(
        session.error.as_deref(),
        Some("File processing error: truncated STL body")
    );
    assert!(session.ended_at.is_some());
}

/// TC-WF-004: Terminal states accept no further writes
/// **Requirement:** DA-WF-010 | **Type:** Unit | **Priority:** P0
#[test]
fn tc_wf_004_terminal_states_frozen() {
    // Given: A session that already timed out (FAILED)
    let mut session = create_test_session();
    session.transition_to(AnalysisStatus::Processing);
    session.fail("Analysis timed out after 120 seconds");

    // When: The abandoned background task reports late results
    let transition = session.transition_to(AnalysisStatus::Completed);
    session.set_progress(100, "Assembling results");

    // Then: All late writes are ignored
    assert!(transition.is_none());
    assert_eq!(session.status, AnalysisStatus::Failed);
    assert_eq!(
        session.error.as_deref(),
        Some("Analysis timed out after 120 seconds")
    );
    assert_ne!(session.progress, 100);
}

/// TC-WF-005: Progress is monotonic and clamped
/// **Requirement:** DA-WF-020 | **Type:** Unit | **Priority:** P0
#[test]
fn tc_wf_005_progress_monotonic() {
    let mut session = create_test_session();
    session.transition_to(AnalysisStatus::Processing);

    session.set_progress(30, "Extracting entities");
    assert_eq!(session.progress, 30);
    assert_eq!(session.stage, "Extracting entities");

    // Lower report never regresses the percentage
    session.set_progress(10, "Reading file metadata");
    assert_eq!(session.progress, 30);

    // Over-100 reports clamp
    session.set_progress(150, "Assembling results");
    assert_eq!(session.progress, 100);
}

/// TC-WF-006: Store snapshots are isolated from later mutation
/// **Requirement:** DA-WF-030 | **Type:** Unit | **Priority:** P1
#[test]
fn tc_wf_006_store_snapshot_isolation() {
    let store = MemorySessionStore::new();
    let session = create_test_session();
    let id = session.session_id;
    store.put(session);

    let snapshot = store.get(&id).expect("registered session");

    // Mutate through the store after taking the snapshot
    assert!(store.update(&id, &mut |s| {
        s.transition_to(AnalysisStatus::Processing);
        s.set_progress(50, "AI analysis");
    }));

    // Old snapshot unchanged; fresh read sees the update
    assert_eq!(snapshot.status, AnalysisStatus::Created);
    let fresh = store.get(&id).expect("registered session");
    assert_eq!(fresh.status, AnalysisStatus::Processing);
    assert_eq!(fresh.progress, 50);
}

/// TC-WF-007: Updating an unknown session is a no-op
/// **Requirement:** DA-WF-030 | **Type:** Unit | **Priority:** P1
#[test]
fn tc_wf_007_unknown_session_update() {
    let store = MemorySessionStore::new();
    assert!(store.get(&Uuid::new_v4()).is_none());
    assert!(!store.update(&Uuid::new_v4(), &mut |_| {}));
}

/// TC-WF-008: Retention sweep drops only expired sessions
/// **Requirement:** DA-WF-030 | **Type:** Unit | **Priority:** P1
#[test]
fn tc_wf_008_retention_sweep() {
    let store = MemorySessionStore::new();

    let fresh = create_test_session();
    let fresh_id = fresh.session_id;
    store.put(fresh);

    let mut stale = create_test_session();
    stale.started_at = chrono::Utc::now() - chrono::Duration::hours(48);
    let stale_id = stale.session_id;
    store.put(stale);

    let removed = store.sweep(chrono::Duration::hours(24));

    assert_eq!(removed, 1);
    assert!(store.get(&fresh_id).is_some());
    assert!(store.get(&stale_id).is_none());
}
