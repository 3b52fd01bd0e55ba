//! Cross-run statistics over de-duplicated run records.

use std::collections::{BTreeSet, HashMap};

use crate::run::RunRecord;
use crate::view::compare_question_ids;

const FALLBACK_FULL_SCORE: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RunTotal {
    pub label: String,
    pub job_id: String,
    pub total_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionAverage {
    pub question_id: String,
    pub average: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Insights {
    pub run_count: usize,
    pub average_total: f64,
    /// Population standard deviation of run totals.
    pub std_dev_total: f64,
    pub top: Option<RunTotal>,
    pub bottom: Option<RunTotal>,
    pub question_ids: Vec<String>,
    pub per_question: Vec<QuestionAverage>,
    pub best_question: Option<QuestionAverage>,
    pub worst_question: Option<QuestionAverage>,
    /// Full marks available per question.
    pub full_score_per_question: f64,
}

impl Insights {
    pub fn from_runs(runs: &[RunRecord]) -> Self {
        if runs.is_empty() {
            return Self {
                full_score_per_question: FALLBACK_FULL_SCORE,
                ..Self::default()
            };
        }

        let totals: Vec<RunTotal> = runs
            .iter()
            .map(|run| RunTotal {
                label: run.identity_key().to_owned(),
                job_id: run.job_id.clone(),
                total_score: run.total_score(),
            })
            .collect();
        let count = totals.len() as f64;
        let average_total = totals.iter().map(|t| t.total_score).sum::<f64>() / count;
        let variance = totals
            .iter()
            .map(|t| (t.total_score - average_total).powi(2))
            .sum::<f64>()
            / count;

        // Ties keep the earliest run, i.e. the newest in store order.
        let top = totals
            .iter()
            .fold(None::<&RunTotal>, |best, t| match best {
                Some(best) if best.total_score >= t.total_score => Some(best),
                _ => Some(t),
            })
            .cloned();
        let bottom = totals
            .iter()
            .fold(None::<&RunTotal>, |worst, t| match worst {
                Some(worst) if worst.total_score <= t.total_score => Some(worst),
                _ => Some(t),
            })
            .cloned();

        let mut samples: HashMap<String, Vec<f64>> = HashMap::new();
        let mut ids = BTreeSet::new();
        for run in runs {
            // Within one run the latest frame for a question wins.
            let mut latest: HashMap<&str, f64> = HashMap::new();
            for payload in run.progress.iter().filter_map(|event| event.as_progress()) {
                latest.insert(payload.question_id.as_str(), payload.normalized_score);
            }
            for (question, score) in latest {
                ids.insert(question.to_owned());
                samples.entry(question.to_owned()).or_default().push(score);
            }
        }
        let mut question_ids: Vec<String> = ids.into_iter().collect();
        question_ids.sort_by(|a, b| compare_question_ids(a, b));

        let per_question: Vec<QuestionAverage> = question_ids
            .iter()
            .map(|question| {
                let scores = samples.get(question).map(Vec::as_slice).unwrap_or(&[]);
                QuestionAverage {
                    question_id: question.clone(),
                    average: scores.iter().sum::<f64>() / scores.len().max(1) as f64,
                    samples: scores.len(),
                }
            })
            .collect();
        let best_question = per_question
            .iter()
            .fold(None::<&QuestionAverage>, |best, q| match best {
                Some(best) if best.average >= q.average => Some(best),
                _ => Some(q),
            })
            .cloned();
        let worst_question = per_question
            .iter()
            .fold(None::<&QuestionAverage>, |worst, q| match worst {
                Some(worst) if worst.average <= q.average => Some(worst),
                _ => Some(q),
            })
            .cloned();

        let full_score_per_question = runs[0]
            .summary
            .as_ref()
            .and_then(|summary| summary.meta.as_ref())
            .and_then(|meta| meta.per_question_full)
            .unwrap_or_else(|| {
                if question_ids.is_empty() {
                    FALLBACK_FULL_SCORE
                } else {
                    100.0 / question_ids.len() as f64
                }
            });

        Self {
            run_count: runs.len(),
            average_total,
            std_dev_total: variance.sqrt(),
            top,
            bottom,
            question_ids,
            per_question,
            best_question,
            worst_question,
            full_score_per_question,
        }
    }

    pub fn max_total(&self) -> f64 {
        self.top
            .as_ref()
            .map(|t| t.total_score.max(0.0))
            .unwrap_or(0.0)
    }
}
