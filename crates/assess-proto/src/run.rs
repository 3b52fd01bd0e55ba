use serde::{Deserialize, Serialize};

use crate::event::{AssessEvent, SummaryPayload};

/// Durable snapshot of one job's accumulated progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_id: String,
    /// Unix epoch milliseconds of the first event seen for the job.
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    /// Full `progress` frames in arrival order.
    #[serde(default)]
    pub progress: Vec<AssessEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryPayload>,
}

impl RunRecord {
    /// Builds the record for `job_id` from a session's event log.
    ///
    /// Progress frames keep their arrival order, the latest summary wins, and
    /// the display name comes from the first progress frame that carries one.
    pub fn from_events(job_id: impl Into<String>, created_at: i64, events: &[AssessEvent]) -> Self {
        let progress: Vec<AssessEvent> = events
            .iter()
            .filter(|event| event.as_progress().is_some())
            .cloned()
            .collect();
        let student_name = progress
            .iter()
            .filter_map(|event| event.as_progress())
            .find_map(|payload| payload.display_name().map(str::to_owned));
        let summary = events
            .iter()
            .rev()
            .find_map(|event| event.as_summary())
            .cloned();
        Self {
            job_id: job_id.into(),
            created_at,
            student_name,
            progress,
            summary,
        }
    }

    /// Merge key: display name when present, otherwise the job id.
    pub fn identity_key(&self) -> &str {
        identity_key(self.student_name.as_deref(), &self.job_id)
    }

    pub fn total_score(&self) -> f64 {
        self.summary
            .as_ref()
            .map(|summary| summary.total_score)
            .unwrap_or(0.0)
    }
}

pub fn identity_key<'a>(student_name: Option<&'a str>, job_id: &'a str) -> &'a str {
    match student_name.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => job_id,
    }
}
