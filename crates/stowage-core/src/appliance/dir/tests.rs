use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::*;
use crate::appliance::find_appliance_error;
use crate::control::AbortToken;
use crate::names;

/// Maps object names under a local root; records completed names.
struct RootChannels {
    root: PathBuf,
    metadata: Metadata,
    completed: Mutex<Vec<String>>,
}

impl RootChannels {
    fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            root: root.to_path_buf(),
            metadata: Metadata::new(),
            completed: Mutex::new(Vec::new()),
        })
    }
}

impl ObjectChannels for RootChannels {
    fn local_path(&self, name: &str) -> Result<PathBuf> {
        names::local_path_for(&self.root, name, None)
    }

    fn outgoing_metadata(&self, _name: &str) -> Metadata {
        self.metadata.clone()
    }

    fn object_completed(&self, name: &str, _metadata: &Metadata) {
        self.completed.lock().unwrap().push(name.to_string());
    }
}

fn options(threads: usize) -> TransferOptions {
    TransferOptions {
        threads,
        abort: AbortToken::new(),
    }
}

fn put_object(name: &str, size: u64) -> PutObject {
    PutObject {
        name: name.into(),
        size,
        checksum: None,
    }
}

#[tokio::test]
async fn put_then_get_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let appliance = DirAppliance::open(tmp.path().join("appliance")).unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir_all(src.join("sub")).unwrap();
    std::fs::write(src.join("a.txt"), b"alpha").unwrap();
    std::fs::write(src.join("sub/b.txt"), b"beta").unwrap();

    appliance.ensure_bucket("b").await.unwrap();
    let id = appliance
        .start_write_job("b", &[put_object("a.txt", 5), put_object("sub/b.txt", 4)])
        .await
        .unwrap();
    assert_eq!(appliance.job_status(id).await.unwrap(), Some(JobStatus::InProgress));

    let summary = appliance
        .transfer(id, RootChannels::new(&src), options(2))
        .await
        .unwrap();
    assert_eq!(summary, TransferSummary { objects: 2, bytes: 9 });
    assert_eq!(appliance.job_status(id).await.unwrap(), Some(JobStatus::Completed));

    let listed = appliance.list_objects("b", None).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "sub/b.txt"]);
    assert_eq!(appliance.list_objects("b", Some("sub/")).await.unwrap().len(), 1);

    let dst = tmp.path().join("dst");
    let get_id = appliance
        .start_read_job("b", &["sub/b.txt".to_string()])
        .await
        .unwrap();
    let channels = RootChannels::new(&dst);
    appliance
        .transfer(get_id, channels.clone(), options(1))
        .await
        .unwrap();
    assert_eq!(std::fs::read(dst.join("sub/b.txt")).unwrap(), b"beta");
    assert_eq!(*channels.completed.lock().unwrap(), vec!["sub/b.txt".to_string()]);
}

#[tokio::test]
async fn read_job_for_missing_object_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let appliance = DirAppliance::open(tmp.path()).unwrap();
    appliance.ensure_bucket("b").await.unwrap();
    let err = appliance
        .start_read_job("b", &["ghost".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(
        find_appliance_error(&err),
        Some(ApplianceError::NoSuchObject { .. })
    ));
}

#[tokio::test]
async fn missing_bucket_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let appliance = DirAppliance::open(tmp.path()).unwrap();
    let err = appliance.list_objects("nope", None).await.unwrap_err();
    assert!(matches!(
        find_appliance_error(&err),
        Some(ApplianceError::NoSuchBucket(_))
    ));
}

#[tokio::test]
async fn unknown_and_canceled_jobs_do_not_transfer() {
    let tmp = tempfile::tempdir().unwrap();
    let appliance = DirAppliance::open(tmp.path().join("appliance")).unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("a"), b"x").unwrap();

    let unknown = JobId::new_v4();
    assert_eq!(appliance.job_status(unknown).await.unwrap(), None);
    let err = appliance
        .transfer(unknown, RootChannels::new(&src), options(1))
        .await
        .unwrap_err();
    assert!(matches!(
        find_appliance_error(&err),
        Some(ApplianceError::UnknownJob(_))
    ));

    appliance.ensure_bucket("b").await.unwrap();
    let id = appliance.start_write_job("b", &[put_object("a", 1)]).await.unwrap();
    appliance.cancel_job(id).await.unwrap();
    assert_eq!(appliance.job_status(id).await.unwrap(), Some(JobStatus::Canceled));
    let err = appliance
        .transfer(id, RootChannels::new(&src), options(1))
        .await
        .unwrap_err();
    assert!(matches!(
        find_appliance_error(&err),
        Some(ApplianceError::JobCanceled(_))
    ));
}

#[tokio::test]
async fn abort_before_start_leaves_job_in_progress() {
    let tmp = tempfile::tempdir().unwrap();
    let appliance = DirAppliance::open(tmp.path().join("appliance")).unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("a"), b"x").unwrap();
    appliance.ensure_bucket("b").await.unwrap();
    let id = appliance.start_write_job("b", &[put_object("a", 1)]).await.unwrap();

    let opts = options(1);
    opts.abort.request_abort();
    let err = appliance
        .transfer(id, RootChannels::new(&src), opts)
        .await
        .unwrap_err();
    assert!(crate::control::is_aborted(&err));
    assert_eq!(appliance.job_status(id).await.unwrap(), Some(JobStatus::InProgress));

    // A second run picks up the remaining object.
    let summary = appliance
        .transfer(id, RootChannels::new(&src), options(1))
        .await
        .unwrap();
    assert_eq!(summary.objects, 1);
    assert_eq!(appliance.job_status(id).await.unwrap(), Some(JobStatus::Completed));
}

#[tokio::test]
async fn checksum_mismatch_rejects_object() {
    let tmp = tempfile::tempdir().unwrap();
    let appliance = DirAppliance::open(tmp.path().join("appliance")).unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("a"), b"x").unwrap();
    appliance.ensure_bucket("b").await.unwrap();
    let id = appliance
        .start_write_job(
            "b",
            &[PutObject {
                name: "a".into(),
                size: 1,
                checksum: Some("00".repeat(32)),
            }],
        )
        .await
        .unwrap();
    let err = appliance
        .transfer(id, RootChannels::new(&src), options(1))
        .await
        .unwrap_err();
    assert!(matches!(
        find_appliance_error(&err),
        Some(ApplianceError::ChecksumMismatch { .. })
    ));
    assert!(appliance.head_object("b", "a").await.unwrap().is_none());
}

#[tokio::test]
async fn failure_categories_absent_empty_and_populated() {
    let tmp = tempfile::tempdir().unwrap();
    let appliance = DirAppliance::open(tmp.path()).unwrap();
    assert_eq!(appliance.failures(FailureCategory::Tape).await.unwrap(), None);

    appliance.set_failures(FailureCategory::Tape, &[]).unwrap();
    assert_eq!(
        appliance.failures(FailureCategory::Tape).await.unwrap(),
        Some(Vec::new())
    );

    let entry = FailureEntry {
        id: "t-1".into(),
        resource_id: Some("TAPE01".into()),
        date: chrono::Utc::now(),
        error_type: "HARDWARE".into(),
        message: "drive offline".into(),
    };
    appliance
        .set_failures(FailureCategory::Tape, std::slice::from_ref(&entry))
        .unwrap();
    assert_eq!(
        appliance.failures(FailureCategory::Tape).await.unwrap(),
        Some(vec![entry])
    );

    appliance.clear_failures(FailureCategory::Tape).unwrap();
    assert_eq!(appliance.failures(FailureCategory::Tape).await.unwrap(), None);
}

#[tokio::test]
async fn imported_object_keeps_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    let appliance = DirAppliance::open(tmp.path()).unwrap();
    let mut md = Metadata::new();
    md.insert("owner".into(), "ops".into());
    appliance.import_object("b", "dir/x", b"123", md.clone()).unwrap();
    let info = appliance.head_object("b", "dir/x").await.unwrap().unwrap();
    assert_eq!(info.size, 3);
    assert_eq!(info.metadata, md);
}
