//! Job record store: conditional transitions, invariant enforcement, and
//! race behavior under concurrent duplicate dispatch.

use std::sync::Arc;

use chrono::Utc;

use annolite::store::{ArchivalStatus, JobRecord, JobStatus, JobStore};

fn pending_record(job_id: &str, user_id: &str) -> JobRecord {
    JobRecord::new(
        job_id,
        user_id,
        "sample.vcf",
        "annolite-inputs",
        format!("{user_id}/{job_id}~sample.vcf"),
    )
}

#[test]
fn conditional_transition_applies_when_expected_matches() {
    let store = JobStore::new();
    store.put(pending_record("J1", "U1"));

    store
        .transition_status("J1", JobStatus::Pending, JobStatus::Running)
        .unwrap();
    assert_eq!(store.get("J1").unwrap().job_status, JobStatus::Running);
}

#[test]
fn conditional_transition_rejects_stale_expectation() {
    let store = JobStore::new();
    store.put(pending_record("J1", "U1"));
    store
        .transition_status("J1", JobStatus::Pending, JobStatus::Running)
        .unwrap();

    let second = store.transition_status("J1", JobStatus::Pending, JobStatus::Running);
    assert!(second.is_err());
    assert_eq!(store.get("J1").unwrap().job_status, JobStatus::Running);
}

#[test]
fn transition_never_moves_status_backward() {
    let store = JobStore::new();
    store.put(pending_record("J1", "U1"));
    store
        .complete("J1", "annolite-results", "U1/J1/sample.annot.vcf", "U1/J1/sample.vcf.count.log", Utc::now())
        .unwrap();

    let backward = store.transition_status("J1", JobStatus::Completed, JobStatus::Pending);
    assert!(backward.is_err());
    assert_eq!(store.get("J1").unwrap().job_status, JobStatus::Completed);
}

/// Two dispatcher instances racing on the same job: exactly one conditional
/// PENDING -> RUNNING transition may apply.
#[tokio::test]
async fn racing_dispatchers_apply_exactly_one_transition() {
    let store = Arc::new(JobStore::new());
    store.put(pending_record("J1", "U1"));

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store
                .transition_status("J1", JobStatus::Pending, JobStatus::Running)
                .is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(store.get("J1").unwrap().job_status, JobStatus::Running);
}

#[test]
fn complete_sets_all_attributes_atomically() {
    let store = JobStore::new();
    store.put(pending_record("J1", "U1"));
    store
        .transition_status("J1", JobStatus::Pending, JobStatus::Running)
        .unwrap();

    let now = Utc::now();
    store
        .complete(
            "J1",
            "annolite-results",
            "U1/J1/sample.annot.vcf",
            "U1/J1/sample.vcf.count.log",
            now,
        )
        .unwrap();

    let record = store.get("J1").unwrap();
    assert_eq!(record.job_status, JobStatus::Completed);
    assert_eq!(record.result_key.as_deref(), Some("U1/J1/sample.annot.vcf"));
    assert_eq!(record.log_key.as_deref(), Some("U1/J1/sample.vcf.count.log"));
    assert_eq!(record.complete_time, Some(now));
}

#[test]
fn archive_id_requires_completed_job() {
    let store = JobStore::new();
    store.put(pending_record("J1", "U1"));

    assert!(store.record_archive("J1", "A123").is_err());
    assert!(store.get("J1").unwrap().results_file_archive_id.is_none());

    store
        .complete("J1", "annolite-results", "r", "l", Utc::now())
        .unwrap();
    store.record_archive("J1", "A123").unwrap();

    let record = store.get("J1").unwrap();
    assert_eq!(record.results_file_archive_id.as_deref(), Some("A123"));
    assert_eq!(record.archival_status, Some(ArchivalStatus::Archived));
}

#[test]
fn thawing_and_restored_require_archive_id() {
    let store = JobStore::new();
    store.put(pending_record("J1", "U1"));
    store
        .complete("J1", "annolite-results", "r", "l", Utc::now())
        .unwrap();

    assert!(store.mark_thawing("J1").is_err());
    assert!(store.mark_restored("J1").is_err());

    store.record_archive("J1", "A123").unwrap();
    store.mark_thawing("J1").unwrap();
    assert_eq!(
        store.get("J1").unwrap().archival_status,
        Some(ArchivalStatus::Thawing)
    );
    store.mark_restored("J1").unwrap();
    assert_eq!(
        store.get("J1").unwrap().archival_status,
        Some(ArchivalStatus::Restored)
    );
}

#[test]
fn jobs_for_user_filters_and_orders_by_submit_time() {
    let store = JobStore::new();
    let mut first = pending_record("J1", "U1");
    first.submit_time = Utc::now() - chrono::Duration::seconds(60);
    store.put(first);
    store.put(pending_record("J2", "U1"));
    store.put(pending_record("J3", "U2"));

    let jobs = store.jobs_for_user("U1");
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].job_id, "J1");
    assert_eq!(jobs[1].job_id, "J2");
}

#[test]
fn missing_job_reports_not_found() {
    let store = JobStore::new();
    assert!(store.get("nope").is_none());
    assert!(store
        .transition_status("nope", JobStatus::Pending, JobStatus::Running)
        .is_err());
}
