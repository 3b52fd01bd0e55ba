use serde::{Deserialize, Serialize};

/// One decoded frame from the assessment stream.
///
/// Every variant carries the job id at the top level next to `type`, with the
/// variant-specific body nested under `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssessEvent {
    Progress {
        job_id: String,
        payload: ProgressPayload,
    },
    Summary {
        job_id: String,
        payload: SummaryPayload,
    },
    Done {
        job_id: String,
        payload: StatusPayload,
    },
    Error {
        job_id: String,
        payload: StatusPayload,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Progress,
    Summary,
    Done,
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Progress => "progress",
            EventKind::Summary => "summary",
            EventKind::Done => "done",
            EventKind::Error => "error",
        }
    }
}

impl AssessEvent {
    pub fn job_id(&self) -> &str {
        match self {
            AssessEvent::Progress { job_id, .. }
            | AssessEvent::Summary { job_id, .. }
            | AssessEvent::Done { job_id, .. }
            | AssessEvent::Error { job_id, .. } => job_id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            AssessEvent::Progress { .. } => EventKind::Progress,
            AssessEvent::Summary { .. } => EventKind::Summary,
            AssessEvent::Done { .. } => EventKind::Done,
            AssessEvent::Error { .. } => EventKind::Error,
        }
    }

    /// `done` and `error` end a job; nothing meaningful follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssessEvent::Done { .. } | AssessEvent::Error { .. })
    }

    pub fn as_progress(&self) -> Option<&ProgressPayload> {
        match self {
            AssessEvent::Progress { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn as_summary(&self) -> Option<&SummaryPayload> {
        match self {
            AssessEvent::Summary { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// A single graded question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub question_id: String,
    /// Share of the 0–100 total earned on this question.
    pub normalized_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    pub student_answer: String,
    pub key_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tips_tr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_comment: Option<String>,
}

impl ProgressPayload {
    /// Display name with blank strings treated as absent.
    pub fn display_name(&self) -> Option<&str> {
        self.student_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub total_score: f64,
    pub average_score: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub overall_feedback: String,
    pub general_comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SummaryMeta>,
}

/// Grading metadata the server attaches to summaries when it has it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_question_full: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub message: String,
}
