use std::cmp::Ordering;
use std::collections::HashMap;

use crate::event::{AssessEvent, ProgressPayload, SummaryPayload};

/// How a job ended, if it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Done(String),
    Failed(String),
}

/// Render-ready projection of a raw event log.
///
/// The log itself is never touched; this collapses repeated progress frames
/// for the same question (later wins) and keeps the last summary and terminal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressBoard {
    pub questions: Vec<ProgressPayload>,
    pub summary: Option<SummaryPayload>,
    pub outcome: Option<TerminalOutcome>,
}

impl ProgressBoard {
    pub fn from_events(events: &[AssessEvent]) -> Self {
        let mut latest: HashMap<&str, &ProgressPayload> = HashMap::new();
        let mut summary = None;
        let mut outcome = None;
        for event in events {
            match event {
                AssessEvent::Progress { payload, .. } => {
                    latest.insert(payload.question_id.as_str(), payload);
                }
                AssessEvent::Summary { payload, .. } => summary = Some(payload.clone()),
                AssessEvent::Done { payload, .. } => {
                    outcome = Some(TerminalOutcome::Done(payload.message.clone()))
                }
                AssessEvent::Error { payload, .. } => {
                    outcome = Some(TerminalOutcome::Failed(payload.message.clone()))
                }
            }
        }
        let mut questions: Vec<ProgressPayload> = latest.into_values().cloned().collect();
        questions.sort_by(|a, b| compare_question_ids(&a.question_id, &b.question_id));
        Self {
            questions,
            summary,
            outcome,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn max_score(&self) -> Option<f64> {
        self.questions
            .iter()
            .map(|q| q.normalized_score)
            .fold(None, |best, score| match best {
                Some(best) if best >= score => Some(best),
                _ => Some(score),
            })
    }
}

/// Orders question ids numerically; ids that are not numbers sort after the
/// numeric ones, lexically among themselves.
pub fn compare_question_ids(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_frame;

    fn frame(q: &str, score: f64) -> AssessEvent {
        decode_frame(&format!(
            r#"{{"type":"progress","job_id":"J1","payload":{{"question_id":"{q}","normalized_score":{score},"student_answer":"s","key_answer":"k"}}}}"#
        ))
        .expect("valid frame")
    }

    #[test]
    fn later_progress_supersedes_and_sorts_numerically() {
        let events = vec![frame("10", 5.0), frame("2", 10.0), frame("2", 15.0), frame("1", 1.0)];
        let board = ProgressBoard::from_events(&events);
        let ids: Vec<&str> = board.questions.iter().map(|q| q.question_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "10"]);
        assert_eq!(board.questions[1].normalized_score, 15.0);
        assert_eq!(board.max_score(), Some(15.0));
        assert!(!board.is_finished());
    }

    #[test]
    fn last_terminal_wins() {
        let events = vec![
            decode_frame(r#"{"type":"error","job_id":"J1","payload":{"message":"grader down"}}"#)
                .unwrap(),
            decode_frame(r#"{"type":"done","job_id":"J1","payload":{"message":"completed"}}"#)
                .unwrap(),
        ];
        let board = ProgressBoard::from_events(&events);
        assert_eq!(board.outcome, Some(TerminalOutcome::Done("completed".into())));
        assert_eq!(board.max_score(), None);
    }

    #[test]
    fn non_numeric_ids_sort_last() {
        assert_eq!(compare_question_ids("9", "bonus"), Ordering::Less);
        assert_eq!(compare_question_ids("b", "a"), Ordering::Greater);
        assert_eq!(compare_question_ids("2", "10"), Ordering::Less);
    }
}
