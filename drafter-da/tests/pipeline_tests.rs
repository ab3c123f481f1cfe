//! Analysis Pipeline Integration Tests
//! Test File: pipeline_tests.rs
//! Requirements: DA-WF-040 (Orchestration), DA-VAL-010 (Validation),
//! DA-PAR-030 (Kernel Bridge Gate), DA-TMP-010 (Temp Lifecycle)

use drafter_da::models::{AnalysisSession, AnalysisStatus, AnalysisType};
use drafter_da::parsers::FileFormat;
use drafter_da::pipeline::{self, AnalysisOptions};
use drafter_da::{ApiError, AppState};
use drafter_common::config::DaConfig;
use uuid::Uuid;

/// Build a state with temp storage under the given directory.
///
/// Converter and kernel bridge stay unconfigured, matching the default
/// deployment where only direct-text formats are available.
fn test_state(temp_root: &std::path::Path) -> AppState {
    let mut config = DaConfig::default();
    config.temp_dir = temp_root.join("uploads");
    config.queue.concurrency = 2;
    config.queue.timeout_secs = 10;
    AppState::from_config(config).expect("test state")
}

/// Register a CREATED session and return its id
fn register(state: &AppState, file_name: &str, format: &str, byte_size: u64) -> Uuid {
    let session = AnalysisSession::new(
        file_name.to_string(),
        format.to_string(),
        byte_size,
        AnalysisType::Standard,
    );
    let id = session.session_id;
    state.sessions.put(session);
    id
}

/// Minimal DXF: 2 layers, 3 lines, 1 circle, one line on the WIRING layer
fn dxf_fixture() -> Vec<u8> {
    let pairs: &[(&str, &str)] = &[
        ("0", "SECTION"),
        ("2", "TABLES"),
        ("0", "TABLE"),
        ("2", "LAYER"),
        ("0", "LAYER"),
        ("2", "WALLS"),
        ("0", "LAYER"),
        ("2", "WIRING"),
        ("0", "ENDTAB"),
        ("0", "ENDSEC"),
        ("0", "SECTION"),
        ("2", "ENTITIES"),
        ("0", "LINE"),
        ("8", "WIRING"),
        ("10", "0.0"),
        ("20", "0.0"),
        ("11", "30.0"),
        ("21", "40.0"),
        ("0", "LINE"),
        ("8", "WALLS"),
        ("10", "0.0"),
        ("20", "0.0"),
        ("11", "100.0"),
        ("21", "0.0"),
        ("0", "LINE"),
        ("8", "WALLS"),
        ("10", "0.0"),
        ("20", "0.0"),
        ("11", "0.0"),
        ("21", "50.0"),
        ("0", "CIRCLE"),
        ("8", "WALLS"),
        ("10", "10.0"),
        ("20", "10.0"),
        ("40", "5.0"),
        ("0", "ENDSEC"),
        ("0", "EOF"),
    ];
    let mut doc = String::new();
    for (code, value) in pairs {
        doc.push_str(code);
        doc.push('\n');
        doc.push_str(value);
        doc.push('\n');
    }
    doc.into_bytes()
}

/// No live upload directories left behind under the temp root
fn assert_temp_empty(state: &AppState) {
    let root = &state.config.temp_dir;
    let leftovers: Vec<_> = std::fs::read_dir(root)
        .map(|entries| entries.filter_map(|e| e.ok()).collect())
        .unwrap_or_default();
    assert!(
        leftovers.is_empty(),
        "temp root should be empty, found {:?}",
        leftovers.iter().map(|e| e.path()).collect::<Vec<_>>()
    );
}

/// TC-PIPE-001: DXF upload runs end to end
/// **Requirement:** DA-WF-040 | **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_pipe_001_dxf_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let bytes = dxf_fixture();
    let id = register(&state, "floor-plan.dxf", "dxf", bytes.len() as u64);

    let result = pipeline::run_analysis(
        &state,
        id,
        FileFormat::Dxf,
        bytes,
        AnalysisOptions::default(),
    )
    .await
    .expect("pipeline should complete");

    assert_eq!(result.entities.lines, 3);
    assert_eq!(result.entities.circles, 1);
    assert_eq!(result.layers, vec!["WALLS", "WIRING"]);
    assert_eq!(result.file_info.file_name, "floor-plan.dxf");
    // 4 entities, 2 layers: round(4*0.05 + 2*5) = 10
    assert_eq!(result.complexity_score, 10);

    let session = state.sessions.get(&id).unwrap();
    assert_eq!(session.status, AnalysisStatus::Completed);
    assert_eq!(session.progress, 100);
    assert_temp_empty(&state);
}

/// TC-PIPE-002: Signature mismatch fails before the queue
/// **Requirement:** DA-VAL-010 | **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_pipe_002_signature_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    // PNG magic bytes declared as DXF
    let bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let id = register(&state, "fake.dxf", "dxf", bytes.len() as u64);

    let err = pipeline::run_analysis(
        &state,
        id,
        FileFormat::Dxf,
        bytes,
        AnalysisOptions::default(),
    )
    .await
    .expect_err("mismatched signature must be rejected");

    assert!(matches!(err, ApiError::BadRequest(_)));
    assert_eq!(state.queue.running(), 0);

    let session = state.sessions.get(&id).unwrap();
    assert_eq!(session.status, AnalysisStatus::Failed);
    assert!(session.error.is_some());
    assert_temp_empty(&state);
}

/// TC-PIPE-003: STEP without the kernel bridge is SERVICE_UNAVAILABLE
/// **Requirement:** DA-PAR-030 | **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_pipe_003_step_without_bridge() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let bytes = b"ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\nENDSEC;\nEND-ISO-10303-21;\n".to_vec();
    let id = register(&state, "bracket.step", "step", bytes.len() as u64);

    let err = pipeline::run_analysis(
        &state,
        id,
        FileFormat::Step,
        bytes,
        AnalysisOptions::default(),
    )
    .await
    .expect_err("bridge is disabled");

    assert!(matches!(err, ApiError::ServiceUnavailable(_, _)));

    let session = state.sessions.get(&id).unwrap();
    assert_eq!(session.status, AnalysisStatus::Failed);
    assert_temp_empty(&state);
}

/// TC-PIPE-004: Identical content is served from the result cache
/// **Requirement:** DA-WF-040 | **Type:** Integration | **Priority:** P1
#[tokio::test]
async fn tc_pipe_004_result_cache_hit() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let bytes = dxf_fixture();

    let first_id = register(&state, "a.dxf", "dxf", bytes.len() as u64);
    let first = pipeline::run_analysis(
        &state,
        first_id,
        FileFormat::Dxf,
        bytes.clone(),
        AnalysisOptions::default(),
    )
    .await
    .unwrap();

    let second_id = register(&state, "b.dxf", "dxf", bytes.len() as u64);
    let second = pipeline::run_analysis(
        &state,
        second_id,
        FileFormat::Dxf,
        bytes,
        AnalysisOptions::default(),
    )
    .await
    .unwrap();

    // Same extraction either way, and the second session still completes
    assert_eq!(first.entities.total(), second.entities.total());
    assert_eq!(first.layers, second.layers);
    let session = state.sessions.get(&second_id).unwrap();
    assert_eq!(session.status, AnalysisStatus::Completed);
    assert_temp_empty(&state);
}

/// TC-PIPE-005: Unknown session is NOT_FOUND
/// **Requirement:** DA-WF-040 | **Type:** Integration | **Priority:** P1
#[tokio::test]
async fn tc_pipe_005_unknown_session() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let err = pipeline::run_analysis(
        &state,
        Uuid::new_v4(),
        FileFormat::Dxf,
        dxf_fixture(),
        AnalysisOptions::default(),
    )
    .await
    .expect_err("session was never registered");

    assert!(matches!(err, ApiError::NotFound(_)));
}

/// TC-PIPE-006: AI stage failure still completes the session
/// **Requirement:** DA-ERR-030 | **Type:** Integration | **Priority:** P1
#[tokio::test]
async fn tc_pipe_006_optional_ai_degrades() {
    let dir = tempfile::tempdir().unwrap();
    // No AI endpoint configured, so the AI stage is skipped entirely
    let state = test_state(dir.path());
    let bytes = dxf_fixture();
    let id = register(&state, "plan.dxf", "dxf", bytes.len() as u64);

    let options = AnalysisOptions {
        include_ai: true,
        ..Default::default()
    };
    let result = pipeline::run_analysis(&state, id, FileFormat::Dxf, bytes, options)
        .await
        .expect("AI absence must not fail the session");

    assert!(result.ai_analysis.is_empty());
    let session = state.sessions.get(&id).unwrap();
    assert_eq!(session.status, AnalysisStatus::Completed);
}

/// TC-PIPE-007: Temp resource is released after a queue timeout
/// **Requirement:** DA-TMP-010 | **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_pipe_007_timeout_releases_temp() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DaConfig::default();
    config.temp_dir = dir.path().join("uploads");
    config.queue.timeout_secs = 1;
    // Nothing listens on this port; attempts fail fast but the retry
    // backoff alone (0.5s + 1s) outlives the one-second queue window
    config.converter.base_url = Some("http://127.0.0.1:1".to_string());
    let state = AppState::from_config(config).expect("test state");

    let mut bytes = b"AC1027".to_vec();
    bytes.extend_from_slice(&[0x00, 0x01, 0x02, 0xFF, 0xFE, 0x80, 0x00, 0x1B]);
    let id = register(&state, "legacy.dwg", "dwg", bytes.len() as u64);

    let err = pipeline::run_analysis(
        &state,
        id,
        FileFormat::Dwg,
        bytes,
        AnalysisOptions::default(),
    )
    .await
    .expect_err("conversion cannot finish inside the window");
    assert!(matches!(err, ApiError::Timeout(1)));

    let session = state.sessions.get(&id).unwrap();
    assert_eq!(session.status, AnalysisStatus::Failed);

    // The caller is gone but the spawned task still owns the upload;
    // wait for it to observe the cancellation and run its cleanup
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    loop {
        let leftovers = std::fs::read_dir(&state.config.temp_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        if leftovers == 0 {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "temp resource still present after the timed-out task settled"
        );
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
