//! Thaw initiation, asynchronous cold-tier retrieval, and the restore
//! handler's idempotency.


use std::time::Duration;

use tempfile::TempDir;

use annolite::error::PipelineError;
use annolite::pipeline::Pipeline;
use annolite::profiles::UserTier;
use annolite::store::{ArchivalStatus, JobRecord, JobStatus, RetrievalTier};
use annolite::worker::{handle_restore, request_thaw};
use test_harness::{test_config, wait_for, TestPipeline};

/// A pipeline with no worker loops running, for tests that drive the stores
/// and handlers by hand.
fn quiet_pipeline() -> (Pipeline, TempDir) {
    let tmp = TempDir::new().expect("tempdir");
    let pipeline = Pipeline::new(test_config(tmp.path()));
    (pipeline, tmp)
}

/// Seed a COMPLETED, ARCHIVED record whose result bytes live in the vault.
/// Returns the archive id.
async fn seed_archived_job(pipeline: &Pipeline, job_id: &str, bytes: &[u8]) -> String {
    let record = JobRecord::new(
        job_id,
        "U1",
        "sample.vcf",
        "annolite-inputs",
        format!("U1/{job_id}~sample.vcf"),
    );
    pipeline.records.put(record);
    pipeline
        .records
        .complete(
            job_id,
            &pipeline.config.storage.results_bucket,
            &format!("U1/{job_id}/sample.annot.vcf"),
            &format!("U1/{job_id}/sample.vcf.count.log"),
            chrono::Utc::now(),
        )
        .unwrap();
    let archive_id = pipeline.vault.upload_archive(bytes).await.unwrap();
    pipeline.records.record_archive(job_id, &archive_id).unwrap();
    archive_id
}

#[tokio::test]
async fn exhausted_expedited_pool_rejects_initiation() {
    let (pipeline, _tmp) = quiet_pipeline();
    let archive_id = pipeline.vault.upload_archive(b"cold").await.unwrap();

    // Fill both expedited slots (retrieval delay keeps them in flight).
    for _ in 0..2 {
        pipeline
            .vault
            .initiate_retrieval(&archive_id, RetrievalTier::Expedited, "{\"job_id\":\"J0\"}")
            .await
            .unwrap();
    }

    let third = pipeline
        .vault
        .initiate_retrieval(&archive_id, RetrievalTier::Expedited, "{\"job_id\":\"J0\"}")
        .await;
    assert!(matches!(third, Err(PipelineError::InsufficientCapacity)));

    // Standard retrievals are unconstrained by the pool.
    pipeline
        .vault
        .initiate_retrieval(&archive_id, RetrievalTier::Standard, "{\"job_id\":\"J0\"}")
        .await
        .unwrap();
}

#[tokio::test]
async fn retrieval_completes_asynchronously_with_snapshot() {
    let (pipeline, _tmp) = quiet_pipeline();
    let archive_id = pipeline.vault.upload_archive(b"annotated bytes").await.unwrap();

    let retrieval_id = pipeline
        .vault
        .initiate_retrieval(&archive_id, RetrievalTier::Expedited, "{\"job_id\":\"J1\"}")
        .await
        .unwrap();

    // Not readable until the delay elapses.
    assert!(pipeline.vault.get_retrieval_output(&retrieval_id).is_err());

    assert!(
        wait_for(
            || async {
                pipeline
                    .vault
                    .retrieval_job(&retrieval_id)
                    .is_ok_and(|j| j.is_ready())
            },
            Duration::from_secs(2),
            Duration::from_millis(10),
        )
        .await
    );

    // Completion was announced on the restore-notification queue.
    let batch = pipeline
        .restore_notifications
        .receive(10, Duration::from_millis(100))
        .await;
    assert_eq!(batch.len(), 1);

    // The snapshot outlives the archive itself.
    pipeline.vault.delete_archive(&archive_id).await.unwrap();
    let bytes = pipeline.vault.get_retrieval_output(&retrieval_id).unwrap();
    assert_eq!(bytes, b"annotated bytes");
}

#[tokio::test]
async fn restore_writes_hot_deletes_cold_and_marks_restored() {
    let (pipeline, _tmp) = quiet_pipeline();
    let archive_id = seed_archived_job(&pipeline, "J1", b"annotated bytes").await;
    pipeline.records.mark_thawing("J1").unwrap();

    let retrieval_id = pipeline
        .vault
        .initiate_retrieval(&archive_id, RetrievalTier::Expedited, "{\"job_id\":\"J1\"}")
        .await
        .unwrap();
    assert!(
        wait_for(
            || async {
                pipeline
                    .vault
                    .retrieval_job(&retrieval_id)
                    .is_ok_and(|j| j.is_ready())
            },
            Duration::from_secs(2),
            Duration::from_millis(10),
        )
        .await
    );

    let bucket = pipeline.config.storage.results_bucket.clone();
    handle_restore(
        &retrieval_id,
        &pipeline.records,
        &pipeline.objects,
        &pipeline.vault,
        &bucket,
    )
    .await
    .unwrap();

    let restored = pipeline
        .objects
        .get_object(&bucket, "U1/J1/sample.annot.vcf")
        .await
        .unwrap();
    assert_eq!(restored, b"annotated bytes");
    assert!(!pipeline.vault.archive_exists(&archive_id).await);
    assert_eq!(
        pipeline.records.get("J1").unwrap().archival_status,
        Some(ArchivalStatus::Restored)
    );

    // Redelivered notification: the second invocation rewrites the same
    // bytes and tolerates the missing archive.
    handle_restore(
        &retrieval_id,
        &pipeline.records,
        &pipeline.objects,
        &pipeline.vault,
        &bucket,
    )
    .await
    .unwrap();
    assert_eq!(
        pipeline.records.get("J1").unwrap().archival_status,
        Some(ArchivalStatus::Restored)
    );
}

#[tokio::test]
async fn request_thaw_targets_only_archived_jobs() {
    let (pipeline, _tmp) = quiet_pipeline();

    seed_archived_job(&pipeline, "J1", b"one").await;

    // Completed but never archived.
    let record = JobRecord::new("J2", "U1", "b.vcf", "annolite-inputs", "U1/J2~b.vcf");
    pipeline.records.put(record);
    pipeline
        .records
        .complete("J2", "annolite-results", "U1/J2/b.annot.vcf", "U1/J2/b.vcf.count.log", chrono::Utc::now())
        .unwrap();

    // Already thawing.
    seed_archived_job(&pipeline, "J3", b"three").await;
    pipeline.records.mark_thawing("J3").unwrap();

    let requested = request_thaw("U1", &pipeline.records, &pipeline.thaw_requests)
        .await
        .unwrap();
    assert_eq!(requested, 1);
    assert_eq!(pipeline.thaw_requests.len(), 1);
    assert_eq!(
        pipeline.records.get("J1").unwrap().archival_status,
        Some(ArchivalStatus::Thawing)
    );
    assert_eq!(
        pipeline.records.get("J3").unwrap().archival_status,
        Some(ArchivalStatus::Thawing)
    );
}

/// With the expedited pool disabled, the thaw initiator falls back to the
/// standard tier and the job still reaches RESTORED end to end.
#[tokio::test]
async fn zero_expedited_slots_still_restores_via_standard() {
    let t = TestPipeline::start_with(|root| {
        let mut config = test_config(root);
        config.retrieval.expedited_slots = 0;
        config
    })
    .await;
    t.add_user("U1", UserTier::FreeUser);

    let input = t.write_input("sample.vcf", "chr1\t100\n").await;
    let submission = t.pipeline.submit(&input, "U1").await.unwrap();
    assert!(t.wait_for_status(&submission.job_id, JobStatus::Completed).await);
    assert!(
        t.wait_for_archival_status(&submission.job_id, ArchivalStatus::Archived)
            .await
    );

    assert_eq!(t.pipeline.upgrade_user("U1").await.unwrap(), 1);
    assert!(
        t.wait_for_archival_status(&submission.job_id, ArchivalStatus::Restored)
            .await
    );

    let record = t.pipeline.records.get(&submission.job_id).unwrap();
    let bucket = &t.pipeline.config.storage.results_bucket;
    assert!(t.pipeline.objects.exists(bucket, &record.result_key.unwrap()).await);
    assert!(!t.pipeline.vault.archive_exists(&record.results_file_archive_id.unwrap()).await);
}
