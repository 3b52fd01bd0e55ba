//! Text-frame codec for the assessment stream.
//!
//! Each frame is one complete JSON document. Anything that is not one of the
//! four event shapes is a [`DecodeError`]; callers drop those frames and keep
//! the session alive. Progress scores outside 0..=100 are clamped, not dropped.

use thiserror::Error;

use crate::event::AssessEvent;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is empty")]
    Empty,
    #[error("frame is not a valid event: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("job_id is empty")]
    MissingJobId,
    #[error("normalized_score is not a finite number")]
    NonFiniteScore,
}

pub fn decode_frame(text: &str) -> Result<AssessEvent, DecodeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }
    let mut event: AssessEvent = serde_json::from_str(text)?;
    normalize(&mut event)?;
    Ok(event)
}

pub fn encode_event(event: &AssessEvent) -> String {
    // Every field is a plain string, number or list; serialization cannot fail.
    serde_json::to_string(event).unwrap_or_default()
}

fn normalize(event: &mut AssessEvent) -> Result<(), DecodeError> {
    if event.job_id().trim().is_empty() {
        return Err(DecodeError::MissingJobId);
    }
    if let AssessEvent::Progress { payload, .. } = event {
        payload.normalized_score = clamp_score(payload.normalized_score)?;
    }
    Ok(())
}

fn clamp_score(score: f64) -> Result<f64, DecodeError> {
    if !score.is_finite() {
        return Err(DecodeError::NonFiniteScore);
    }
    Ok(score.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, StatusPayload};

    #[test]
    fn decodes_progress_frame() {
        let frame = r#"{
            "type": "progress",
            "job_id": "J1",
            "payload": {
                "question_id": "3",
                "normalized_score": 12.5,
                "student_answer": "photosynthesis",
                "key_answer": "photosynthesis in chloroplasts",
                "student_name": "Ada",
                "reasoning_tr": "mostly right"
            }
        }"#;
        let event = decode_frame(frame).expect("progress decodes");
        assert_eq!(event.job_id(), "J1");
        assert_eq!(event.kind(), EventKind::Progress);
        let progress = event.as_progress().expect("progress payload");
        assert_eq!(progress.question_id, "3");
        assert_eq!(progress.display_name(), Some("Ada"));
        assert!(progress.question_text.is_none());
        assert!(!event.is_terminal());
    }

    #[test]
    fn decodes_summary_with_meta() {
        let frame = r#"{"type":"summary","job_id":"J1","payload":{
            "total_score": 70, "average_score": 35,
            "strengths": ["1"], "weaknesses": ["2"],
            "overall_feedback": "good", "general_comment": "ok",
            "meta": {"questions": 2, "per_question_full": 50.0, "raw_total_out_of_60": 14}
        }}"#;
        let event = decode_frame(frame).expect("summary decodes");
        let summary = event.as_summary().expect("summary payload");
        assert_eq!(summary.total_score, 70.0);
        assert_eq!(summary.strengths, vec!["1".to_string()]);
        assert_eq!(
            summary.meta.as_ref().and_then(|m| m.per_question_full),
            Some(50.0)
        );
    }

    #[test]
    fn decodes_terminal_frames() {
        let done = decode_frame(r#"{"type":"done","job_id":"J1","payload":{"message":"completed"}}"#)
            .expect("done decodes");
        assert!(done.is_terminal());
        let error = decode_frame(r#"{"type":"error","job_id":"J1","payload":{"message":"boom"}}"#)
            .expect("error decodes");
        assert_eq!(
            error,
            AssessEvent::Error {
                job_id: "J1".into(),
                payload: StatusPayload {
                    message: "boom".into()
                }
            }
        );
    }

    #[test]
    fn rejects_noise_and_unknown_shapes() {
        assert!(matches!(decode_frame(""), Err(DecodeError::Empty)));
        assert!(matches!(decode_frame("ping"), Err(DecodeError::Shape(_))));
        assert!(decode_frame(r#"{"type":"pong","job_id":"J1","payload":{}}"#).is_err());
        assert!(decode_frame(r#"{"type":"done","payload":{"message":"x"}}"#).is_err());
        assert!(
            decode_frame(r#"{"type":"progress","job_id":"J1","payload":{"question_id":"1"}}"#)
                .is_err()
        );
        assert!(matches!(
            decode_frame(r#"{"type":"done","job_id":"  ","payload":{"message":"x"}}"#),
            Err(DecodeError::MissingJobId)
        ));
    }

    fn score_frame(score: &str) -> String {
        format!(
            r#"{{"type":"progress","job_id":"J1","payload":{{
            "question_id":"1","normalized_score":{score},"student_answer":"a","key_answer":"b"}}}}"#
        )
    }

    fn decoded_score(frame: &str) -> f64 {
        decode_frame(frame)
            .expect("progress decodes")
            .as_progress()
            .expect("progress payload")
            .normalized_score
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(decoded_score(&score_frame("101")), 100.0);
        assert_eq!(decoded_score(&score_frame("-5.5")), 0.0);
        assert_eq!(decoded_score(&score_frame("0")), 0.0);
        assert_eq!(decoded_score(&score_frame("99.5")), 99.5);
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        assert!(matches!(clamp_score(f64::NAN), Err(DecodeError::NonFiniteScore)));
        assert!(matches!(
            clamp_score(f64::NEG_INFINITY),
            Err(DecodeError::NonFiniteScore)
        ));
        assert_eq!(clamp_score(100.0).ok(), Some(100.0));
    }

    #[test]
    fn encoded_frames_carry_type_and_job_id() {
        let event = AssessEvent::Done {
            job_id: "J9".into(),
            payload: StatusPayload {
                message: "completed".into(),
            },
        };
        let value: serde_json::Value =
            serde_json::from_str(&encode_event(&event)).expect("valid json");
        assert_eq!(value["type"], "done");
        assert_eq!(value["job_id"], "J9");
        assert_eq!(value["payload"]["message"], "completed");
    }
}
