//! Integration tests: bulk PUT/GET against a directory-backed appliance,
//! covering sync decisions, descriptor lifecycle and the failure gate.

mod common;

use common::{context, write_file, CrashingAppliance, T0_MS, T0_SECS};
use std::sync::Arc;
use stowage_core::appliance::{Appliance, DirAppliance, JobStatus};
use stowage_core::bulk::{
    self, GetBulkOptions, GetObjectOptions, JobInterrupted, JobPhase, PutBulkOptions, PutSource,
};
use stowage_core::health::{FailureCategory, HealthCheckFailed};
use stowage_core::metadata::{self, Metadata, LAST_MODIFIED_KEY};
use stowage_core::recovery::{JobFilter, RecoveryError};
use tempfile::tempdir;

fn put_opts(bucket: &str, dir: &std::path::Path, sync: bool) -> PutBulkOptions {
    PutBulkOptions {
        bucket: bucket.into(),
        source: PutSource::Directory(dir.to_path_buf()),
        prefix: None,
        sync,
        force: false,
        threads: 2,
        checksum: false,
        metadata: Metadata::new(),
        ignore_naming_conflicts: false,
        follow_symlinks: false,
    }
}

fn get_opts(bucket: &str, dir: &std::path::Path, sync: bool) -> GetBulkOptions {
    GetBulkOptions {
        bucket: bucket.into(),
        directory: dir.to_path_buf(),
        prefixes: Vec::new(),
        piped_names: None,
        sync,
        force: false,
        threads: 2,
        mirror: false,
    }
}

#[tokio::test]
async fn put_with_sync_records_local_mtime_in_metadata() {
    let src = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    write_file(src.path(), "a.txt", b"alpha", T0_SECS);
    write_file(src.path(), "nested/b.txt", b"beta", T0_SECS);

    let appliance = DirAppliance::open(root.path()).unwrap();
    let ctx = context(Arc::new(appliance.clone()), rec.path());
    let outcome = bulk::put_bulk(&ctx, put_opts("bk", src.path(), true))
        .await
        .unwrap();

    assert_eq!(outcome.phase, Some(JobPhase::Completed));
    assert_eq!(outcome.transferred.len(), 2);
    for name in ["a.txt", "nested/b.txt"] {
        let info = appliance.head_object("bk", name).await.unwrap().unwrap();
        assert_eq!(metadata::decode_last_modified(&info.metadata), Some(T0_MS));
        assert!(info.metadata.contains_key(LAST_MODIFIED_KEY));
    }
}

#[tokio::test]
async fn second_sync_put_transfers_nothing() {
    let src = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    write_file(src.path(), "a.txt", b"alpha", T0_SECS);

    let ctx = context(Arc::new(DirAppliance::open(root.path()).unwrap()), rec.path());
    bulk::put_bulk(&ctx, put_opts("bk", src.path(), true))
        .await
        .unwrap();
    let again = bulk::put_bulk(&ctx, put_opts("bk", src.path(), true))
        .await
        .unwrap();

    assert!(again.transferred.is_empty());
    assert_eq!(again.skipped, vec!["a.txt".to_string()]);
    assert!(again.job_id.is_none());
    assert_eq!(again.message, "SUCCESS: All files are up to date");
}

#[tokio::test]
async fn sync_put_sends_only_modified_files() {
    let src = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    write_file(src.path(), "a.txt", b"alpha", T0_SECS);
    write_file(src.path(), "b.txt", b"beta", T0_SECS);

    let ctx = context(Arc::new(DirAppliance::open(root.path()).unwrap()), rec.path());
    bulk::put_bulk(&ctx, put_opts("bk", src.path(), true))
        .await
        .unwrap();
    write_file(src.path(), "b.txt", b"beta v2", T0_SECS + 60);

    let outcome = bulk::put_bulk(&ctx, put_opts("bk", src.path(), true))
        .await
        .unwrap();
    assert_eq!(outcome.transferred, vec!["b.txt".to_string()]);
    assert_eq!(outcome.skipped, vec!["a.txt".to_string()]);
}

#[tokio::test]
async fn get_restores_mtime_and_sync_skips_newer_local_copy() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    write_file(src.path(), "doc.txt", b"contents", T0_SECS);

    let ctx = context(Arc::new(DirAppliance::open(root.path()).unwrap()), rec.path());
    bulk::put_bulk(&ctx, put_opts("bk", src.path(), false))
        .await
        .unwrap();

    let outcome = bulk::get_bulk(&ctx, get_opts("bk", dst.path(), false))
        .await
        .unwrap();
    assert_eq!(outcome.phase, Some(JobPhase::Completed));
    let local = dst.path().join("doc.txt");
    assert_eq!(std::fs::read(&local).unwrap(), b"contents");
    assert_eq!(metadata::local_last_modified(&local).unwrap(), T0_MS);

    // Local copy edited after the object was stored: leave it alone.
    write_file(dst.path(), "doc.txt", b"edited locally", T0_SECS + 3600);
    let single = bulk::get_object(
        &ctx,
        GetObjectOptions {
            bucket: "bk".into(),
            name: "doc.txt".into(),
            directory: dst.path().to_path_buf(),
            sync: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(single.message, "No need to sync doc.txt");
    assert_eq!(std::fs::read(&local).unwrap(), b"edited locally");

    let bulk_sync = bulk::get_bulk(&ctx, get_opts("bk", dst.path(), true))
        .await
        .unwrap();
    assert_eq!(bulk_sync.skipped, vec!["doc.txt".to_string()]);
    assert!(bulk_sync.job_id.is_none());
}

#[tokio::test]
async fn mirror_get_removes_stale_local_files() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    write_file(src.path(), "keep.txt", b"k", T0_SECS);
    write_file(dst.path(), "stale.txt", b"s", T0_SECS);

    let ctx = context(Arc::new(DirAppliance::open(root.path()).unwrap()), rec.path());
    bulk::put_bulk(&ctx, put_opts("bk", src.path(), false))
        .await
        .unwrap();

    let mut opts = get_opts("bk", dst.path(), false);
    opts.mirror = true;
    let outcome = bulk::get_bulk(&ctx, opts).await.unwrap();

    assert!(dst.path().join("keep.txt").exists());
    assert!(!dst.path().join("stale.txt").exists());
    assert_eq!(outcome.deleted, vec![dst.path().join("stale.txt")]);
}

#[tokio::test]
async fn descriptor_is_written_before_transfer_and_survives_a_crash() {
    let src = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    write_file(src.path(), "a.txt", b"alpha", T0_SECS);

    let inner = DirAppliance::open(root.path()).unwrap();
    let ctx = context(Arc::new(CrashingAppliance { inner }), rec.path());
    let mut opts = put_opts("bk", src.path(), false);
    opts.threads = 7;
    opts.prefix = Some("backup/".into());
    let err = bulk::put_bulk(&ctx, opts).await.unwrap_err();

    let interrupted = err
        .downcast_ref::<JobInterrupted>()
        .expect("crash is reported as an interruption");
    let descriptor = ctx.store.read(interrupted.job_id).unwrap();
    assert_eq!(descriptor.id, interrupted.job_id);
    assert_eq!(descriptor.bucket_name, "bk");
    assert_eq!(descriptor.directory.as_deref(), Some(src.path()));
    assert_eq!(descriptor.prefixes, vec!["backup/".to_string()]);
    assert_eq!(descriptor.number_of_threads, 7);
    assert_eq!(descriptor.recovery_command, "recover_put_bulk");
}

#[tokio::test]
async fn descriptor_is_removed_after_success() {
    let src = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    write_file(src.path(), "a.txt", b"alpha", T0_SECS);

    let ctx = context(Arc::new(DirAppliance::open(root.path()).unwrap()), rec.path());
    let outcome = bulk::put_bulk(&ctx, put_opts("bk", src.path(), false))
        .await
        .unwrap();
    let id = outcome.job_id.unwrap();

    match ctx.store.read(id) {
        Err(RecoveryError::NotFound(missing)) => assert_eq!(missing, id),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(ctx.store.search(&JobFilter::default()).unwrap().is_empty());
}

#[tokio::test]
async fn tape_failure_blocks_put_until_forced() {
    let src = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    write_file(src.path(), "a.txt", b"alpha", T0_SECS);

    let appliance = DirAppliance::open(root.path()).unwrap();
    common::set_tape_failure(&appliance, FailureCategory::Tape);
    let ctx = context(Arc::new(appliance.clone()), rec.path());

    let err = bulk::put_bulk(&ctx, put_opts("bk", src.path(), false))
        .await
        .unwrap_err();
    let gate = err
        .downcast_ref::<HealthCheckFailed>()
        .expect("health gate refusal");
    assert_eq!(gate.category, FailureCategory::Tape);
    let rendered = gate.to_string();
    assert!(rendered.contains("Tape Failures"));
    assert!(rendered.contains("TAPE0001"));
    assert!(rendered.ends_with("To ignore this error use --force"));
    // Refused before any job was created.
    assert!(appliance.head_object("bk", "a.txt").await.unwrap().is_none());
    assert!(ctx.store.search(&JobFilter::default()).unwrap().is_empty());

    let mut forced = put_opts("bk", src.path(), false);
    forced.force = true;
    let outcome = bulk::put_bulk(&ctx, forced).await.unwrap();
    assert_eq!(outcome.phase, Some(JobPhase::Completed));
    assert_eq!(outcome.warnings.len(), 1);
    assert!(appliance.head_object("bk", "a.txt").await.unwrap().is_some());
}

#[tokio::test]
async fn get_of_missing_prefix_fails_without_descriptor() {
    let dst = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    let appliance = DirAppliance::open(root.path()).unwrap();
    appliance
        .import_object("bk", "logs/a.log", b"x", Metadata::new())
        .unwrap();
    let ctx = context(Arc::new(appliance), rec.path());

    let mut opts = get_opts("bk", dst.path(), false);
    opts.prefixes = vec!["images/".into()];
    let err = bulk::get_bulk(&ctx, opts).await.unwrap_err();
    assert_eq!(err.to_string(), "No matching objects in bucket bk");
    assert!(ctx.store.search(&JobFilter::default()).unwrap().is_empty());
}

#[tokio::test]
async fn mirror_with_piped_names_keeps_files_still_in_bucket() {
    let dst = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    let appliance = DirAppliance::open(root.path()).unwrap();
    appliance
        .import_object("bk", "a.txt", b"a", Metadata::new())
        .unwrap();
    appliance
        .import_object("bk", "b.txt", b"b", Metadata::new())
        .unwrap();
    write_file(dst.path(), "b.txt", b"local b", T0_SECS);
    write_file(dst.path(), "gone.txt", b"g", T0_SECS);
    let ctx = context(Arc::new(appliance), rec.path());

    let mut opts = get_opts("bk", dst.path(), false);
    opts.piped_names = Some(vec!["a.txt".into()]);
    opts.mirror = true;
    let outcome = bulk::get_bulk(&ctx, opts).await.unwrap();

    assert_eq!(outcome.transferred, vec!["a.txt".to_string()]);
    assert_eq!(std::fs::read(dst.path().join("b.txt")).unwrap(), b"local b");
    assert_eq!(outcome.deleted, vec![dst.path().join("gone.txt")]);
    assert!(!dst.path().join("gone.txt").exists());
}

#[tokio::test]
async fn abort_cancels_put_job_and_keeps_descriptor() {
    let src = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    write_file(src.path(), "a.txt", b"alpha", T0_SECS);

    let appliance = DirAppliance::open(root.path()).unwrap();
    let ctx = context(Arc::new(appliance.clone()), rec.path());
    ctx.abort.request_abort();
    let err = bulk::put_bulk(&ctx, put_opts("bk", src.path(), false))
        .await
        .unwrap_err();

    let interrupted = err
        .downcast_ref::<JobInterrupted>()
        .expect("abort is reported as an interruption");
    assert_eq!(interrupted.reason, "canceled by operator");
    let id = interrupted.job_id;
    assert_eq!(
        appliance.job_status(id).await.unwrap(),
        Some(JobStatus::Canceled)
    );
    assert_eq!(ctx.store.read(id).unwrap().id, id);
    assert!(appliance.head_object("bk", "a.txt").await.unwrap().is_none());
}

#[tokio::test]
async fn abort_cancels_single_object_read_job() {
    let dst = tempdir().unwrap();
    let root = tempdir().unwrap();
    let rec = tempdir().unwrap();
    let appliance = DirAppliance::open(root.path()).unwrap();
    appliance
        .import_object("bk", "one.bin", b"1", Metadata::new())
        .unwrap();
    let ctx = context(Arc::new(appliance.clone()), rec.path());
    ctx.abort.request_abort();

    let err = bulk::get_object(
        &ctx,
        GetObjectOptions {
            bucket: "bk".into(),
            name: "one.bin".into(),
            directory: dst.path().to_path_buf(),
            sync: false,
        },
    )
    .await
    .unwrap_err();

    let interrupted = err
        .downcast_ref::<JobInterrupted>()
        .expect("abort is reported as an interruption");
    assert_eq!(
        appliance.job_status(interrupted.job_id).await.unwrap(),
        Some(JobStatus::Canceled)
    );
    assert!(!dst.path().join("one.bin").exists());
    assert!(ctx.store.search(&JobFilter::default()).unwrap().is_empty());
}
