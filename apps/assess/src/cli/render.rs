//! Plain-text rendering for terminal output.

use std::fmt::Write as _;

use assess_proto::{AssessEvent, Insights, ProgressBoard, RunRecord, TerminalOutcome};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub fn event_line(event: &AssessEvent) -> String {
    match event {
        AssessEvent::Progress { payload, .. } => {
            let mut line = format!(
                "Q{:<4} {:>6.1}",
                payload.question_id, payload.normalized_score
            );
            if let Some(name) = payload.display_name() {
                let _ = write!(line, "  [{name}]");
            }
            if let Some(reasoning) = payload.reasoning_tr.as_deref().filter(|r| !r.is_empty()) {
                let _ = write!(line, "  {reasoning}");
            }
            line
        }
        AssessEvent::Summary { payload, .. } => format!(
            "summary: total {:.1}, average {:.1}",
            payload.total_score, payload.average_score
        ),
        AssessEvent::Done { payload, .. } => format!("done: {}", payload.message),
        AssessEvent::Error { payload, .. } => format!("failed: {}", payload.message),
    }
}

pub fn board(board: &ProgressBoard) -> String {
    let mut out = String::new();
    let max = board.max_score().unwrap_or(0.0);
    for question in &board.questions {
        let _ = writeln!(
            out,
            "Q{:<4} {:>6.1} {}",
            question.question_id,
            question.normalized_score,
            bar(question.normalized_score, max, 20)
        );
        if let Some(tips) = question.tips_tr.as_deref().filter(|t| !t.is_empty()) {
            let _ = writeln!(out, "      tip: {tips}");
        }
    }
    if let Some(summary) = &board.summary {
        let _ = writeln!(
            out,
            "Total {:.1}  Average {:.1}",
            summary.total_score, summary.average_score
        );
        if !summary.strengths.is_empty() {
            let _ = writeln!(out, "Strengths: {}", summary.strengths.join("; "));
        }
        if !summary.weaknesses.is_empty() {
            let _ = writeln!(out, "Weaknesses: {}", summary.weaknesses.join("; "));
        }
        if !summary.overall_feedback.is_empty() {
            let _ = writeln!(out, "{}", summary.overall_feedback);
        }
    }
    match &board.outcome {
        Some(TerminalOutcome::Done(message)) => {
            let _ = writeln!(out, "Finished: {message}");
        }
        Some(TerminalOutcome::Failed(message)) => {
            let _ = writeln!(out, "Failed: {message}");
        }
        None => {}
    }
    out
}

pub fn runs(runs: &[RunRecord]) -> String {
    if runs.is_empty() {
        return "No stored runs.\n".to_string();
    }
    let mut out = String::new();
    for run in runs {
        let total = run
            .summary
            .as_ref()
            .map(|s| format!("{:.1}", s.total_score))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{}  {:<24} {:>7}  {} questions  {}",
            timestamp(run.created_at),
            run.identity_key(),
            total,
            run.progress.len(),
            run.job_id
        );
    }
    out
}

pub fn insights(insights: &Insights) -> String {
    if insights.run_count == 0 {
        return "No stored runs.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "Runs: {}", insights.run_count);
    let _ = writeln!(
        out,
        "Average total: {:.1} (std dev {:.1})",
        insights.average_total, insights.std_dev_total
    );
    if let Some(top) = &insights.top {
        let _ = writeln!(out, "Top: {} ({:.1})", top.label, top.total_score);
    }
    if let Some(bottom) = &insights.bottom {
        let _ = writeln!(out, "Bottom: {} ({:.1})", bottom.label, bottom.total_score);
    }
    if !insights.per_question.is_empty() {
        let _ = writeln!(out, "Per question (of {:.0}):", insights.full_score_per_question);
        for question in &insights.per_question {
            let _ = writeln!(
                out,
                "  Q{:<4} {:>6.1}  ({} runs)",
                question.question_id, question.average, question.samples
            );
        }
    }
    if let Some(best) = &insights.best_question {
        let _ = writeln!(out, "Strongest: Q{} ({:.1})", best.question_id, best.average);
    }
    if let Some(worst) = &insights.worst_question {
        let _ = writeln!(out, "Weakest: Q{} ({:.1})", worst.question_id, worst.average);
    }
    out
}

fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let filled = ((value / max).clamp(0.0, 1.0) * width as f64).round() as usize;
    "#".repeat(filled)
}

fn timestamp(unix_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(unix_ms) * 1_000_000)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| unix_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_proto::{ProgressPayload, StatusPayload};

    fn progress(question_id: &str, score: f64) -> AssessEvent {
        AssessEvent::Progress {
            job_id: "J1".into(),
            payload: ProgressPayload {
                question_id: question_id.into(),
                normalized_score: score,
                question_text: None,
                student_answer: String::new(),
                key_answer: String::new(),
                student_name: Some("Ada".into()),
                reasoning_tr: None,
                tips_tr: Some("show units".into()),
                overall_comment: None,
            },
        }
    }

    #[test]
    fn renders_board_with_outcome() {
        let events = vec![
            progress("2", 40.0),
            progress("1", 80.0),
            AssessEvent::Done {
                job_id: "J1".into(),
                payload: StatusPayload {
                    message: "ok".into(),
                },
            },
        ];
        let text = board(&ProgressBoard::from_events(&events));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Q1"));
        assert!(lines[0].ends_with(&"#".repeat(20)));
        assert!(lines[1].contains("tip: show units"));
        assert!(text.ends_with("Finished: ok\n"));
    }

    #[test]
    fn event_line_includes_name() {
        assert!(event_line(&progress("3", 12.5)).contains("[Ada]"));
    }

    #[test]
    fn timestamp_is_rfc3339() {
        assert_eq!(timestamp(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn empty_listings() {
        assert_eq!(runs(&[]), "No stored runs.\n");
        assert_eq!(insights(&Insights::from_runs(&[])), "No stored runs.\n");
    }
}
