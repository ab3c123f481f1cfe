//! Analysis session state machine
//!
//! **[DA-WF-010]** A session progresses through:
//! CREATED → PROCESSING → {COMPLETED, FAILED}
//!
//! **[DA-WF-020]** Progress is a 0-100 percentage, monotonically
//! non-decreasing while the session is non-terminal. Once a terminal state
//! is reached, further progress writes are ignored. Exactly one pipeline
//! invocation owns the writes for a given session; concurrent status reads
//! are permitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// **[DA-WF-010]** Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalysisStatus {
    /// Session registered with file metadata, not yet queued
    Created,
    /// Parse task handed to the queue
    Processing,
    /// Analysis finished successfully
    Completed,
    /// Analysis failed with an unrecoverable error
    Failed,
}

impl AnalysisStatus {
    /// Terminal states freeze the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

/// Requested depth of analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    #[default]
    Standard,
    Detailed,
    Professional,
    Measurement,
}

impl AnalysisType {
    /// Parse from the multipart `analysisType` field
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(AnalysisType::Standard),
            "detailed" => Some(AnalysisType::Detailed),
            "professional" => Some(AnalysisType::Professional),
            "measurement" => Some(AnalysisType::Measurement),
            _ => None,
        }
    }
}

/// Requested parse precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Low,
    #[default]
    Standard,
    High,
}

impl Precision {
    /// Parse from the multipart `precision` field
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Precision::Low),
            "standard" => Some(Precision::Standard),
            "high" => Some(Precision::High),
            _ => None,
        }
    }
}

/// **[DA-WF-010]** State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_status: AnalysisStatus,
    pub new_status: AnalysisStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// **[DA-WF-020]** Analysis session (in-memory state)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    /// Unique session identifier
    pub session_id: Uuid,

    /// Original uploaded file name
    pub file_name: String,

    /// Declared format (lowercase extension, e.g. "dxf")
    pub format: String,

    /// Upload size in bytes
    pub byte_size: u64,

    /// Requested analysis depth
    pub analysis_type: AnalysisType,

    /// Current lifecycle state
    pub status: AnalysisStatus,

    /// Percentage complete (0-100, monotonic while non-terminal)
    pub progress: u8,

    /// Current stage label (e.g. "Extracting entities")
    pub stage: String,

    /// Failure message when status is FAILED
    pub error: Option<String>,

    /// Session start time
    pub started_at: DateTime<Utc>,

    /// Session end time (set at COMPLETED/FAILED)
    pub ended_at: Option<DateTime<Utc>>,
}

impl AnalysisSession {
    /// Register a new session with file metadata
    pub fn new(
        file_name: String,
        format: String,
        byte_size: u64,
        analysis_type: AnalysisType,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            file_name,
            format,
            byte_size,
            analysis_type,
            status: AnalysisStatus::Created,
            progress: 0,
            stage: "Created".to_string(),
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new lifecycle state
    ///
    /// Returns `None` if the session is already terminal; terminal states
    /// accept no further writes.
    pub fn transition_to(&mut self, new_status: AnalysisStatus) -> Option<StateTransition> {
        if self.status.is_terminal() {
            return None;
        }
        let transition = StateTransition {
            session_id: self.session_id,
            old_status: self.status,
            new_status,
            transitioned_at: Utc::now(),
        };
        self.status = new_status;

        if new_status.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        Some(transition)
    }

    /// **[DA-WF-020]** Write a progress checkpoint
    ///
    /// Monotonic: a lower percentage than the current value is clamped up to
    /// the current value (the stage label still updates). Ignored entirely
    /// once the session is terminal.
    pub fn set_progress(&mut self, percent: u8, stage: &str) {
        if self.status.is_terminal() {
            return;
        }
        self.progress = self.progress.max(percent.min(100));
        self.stage = stage.to_string();
    }

    /// Mark COMPLETED at 100%
    pub fn complete(&mut self) -> Option<StateTransition> {
        self.set_progress(100, "Completed");
        self.transition_to(AnalysisStatus::Completed)
    }

    /// Mark FAILED, recording the error and halting progress writes
    pub fn fail(&mut self, error: impl Into<String>) -> Option<StateTransition> {
        if self.status.is_terminal() {
            return None;
        }
        self.error = Some(error.into());
        self.stage = "Failed".to_string();
        self.transition_to(AnalysisStatus::Failed)
    }

    /// Elapsed wall-clock milliseconds since session start
    pub fn elapsed_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}
