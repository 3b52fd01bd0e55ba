//! Merge and de-duplication policy shared by every backend.

use std::collections::HashSet;

use assess_proto::RunRecord;

/// Applies one upsert to `runs` in place.
///
/// A stored record with the same job id is replaced where it sits. Otherwise
/// every record sharing the incoming identity key is dropped and the new
/// record goes to the front. The list is then cut to `cap`, oldest last.
pub fn upsert_into(runs: &mut Vec<RunRecord>, record: RunRecord, cap: usize) {
    if let Some(index) = runs.iter().position(|run| run.job_id == record.job_id) {
        runs[index] = record;
    } else {
        let key = record.identity_key().to_owned();
        runs.retain(|run| run.identity_key() != key);
        runs.insert(0, record);
    }
    runs.truncate(cap);
}

/// Keeps the first record per identity key, preserving order.
pub fn dedup_by_identity(runs: Vec<RunRecord>) -> Vec<RunRecord> {
    let mut seen = HashSet::new();
    runs.into_iter()
        .filter(|run| seen.insert(run.identity_key().to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(job: &str, name: Option<&str>) -> RunRecord {
        RunRecord {
            job_id: job.into(),
            created_at: 0,
            student_name: name.map(str::to_owned),
            progress: Vec::new(),
            summary: None,
        }
    }

    fn jobs(runs: &[RunRecord]) -> Vec<&str> {
        runs.iter().map(|run| run.job_id.as_str()).collect()
    }

    #[test]
    fn new_identity_goes_to_front() {
        let mut runs = vec![run("1", Some("A"))];
        upsert_into(&mut runs, run("2", Some("B")), 100);
        assert_eq!(jobs(&runs), vec!["2", "1"]);
    }

    #[test]
    fn same_job_updates_in_place() {
        let mut runs = vec![run("3", Some("C")), run("1", None), run("2", Some("B"))];
        let mut updated = run("1", None);
        updated.created_at = 99;
        upsert_into(&mut runs, updated, 100);
        assert_eq!(jobs(&runs), vec!["3", "1", "2"]);
        assert_eq!(runs[1].created_at, 99);
    }

    #[test]
    fn job_id_match_beats_identity_match() {
        // Job 2 learns its display name after another run already claimed it.
        let mut runs = vec![run("1", Some("A")), run("2", None)];
        upsert_into(&mut runs, run("2", Some("A")), 100);
        assert_eq!(jobs(&runs), vec!["1", "2"]);
        assert_eq!(runs[1].student_name.as_deref(), Some("A"));
    }

    #[test]
    fn conflicting_identity_replaces_rather_than_duplicates() {
        let mut runs = vec![run("2", Some("B")), run("1", Some("A"))];
        upsert_into(&mut runs, run("3", Some("A")), 100);
        assert_eq!(jobs(&runs), vec!["3", "2"]);
    }

    #[test]
    fn truncates_to_cap_dropping_oldest() {
        let mut runs = Vec::new();
        for i in 0..5 {
            upsert_into(&mut runs, run(&i.to_string(), None), 3);
        }
        assert_eq!(jobs(&runs), vec!["4", "3", "2"]);
    }

    #[test]
    fn replaying_an_upsert_is_idempotent() {
        let mut once = vec![run("1", Some("A")), run("2", None)];
        upsert_into(&mut once, run("3", Some("B")), 100);
        let mut twice = once.clone();
        upsert_into(&mut twice, run("3", Some("B")), 100);
        assert_eq!(once, twice);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let runs = vec![run("1", Some("A")), run("2", Some("A")), run("3", Some("B"))];
        let deduped = dedup_by_identity(runs);
        assert_eq!(jobs(&deduped), vec!["1", "3"]);
        assert_eq!(deduped[0].student_name.as_deref(), Some("A"));
        assert_eq!(deduped[1].student_name.as_deref(), Some("B"));
    }
}
