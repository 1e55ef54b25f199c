use contentdex_core::db::open_db_in_memory;
use contentdex_core::{
    extension_filter, CancellationToken, CatalogConfig, CatalogQuery, CatalogStore,
    DigestAlgorithm, FilterScope, Fingerprinter, IngestError, IngestService, PathPredicate,
    ScanOptions, SkipCause, SqliteCatalogStore, StoreError, TraverseError,
};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Two identical files under different names, a distinct file, and a
/// subdirectory holding one more distinct file.
fn create_testing_dir(root: &Path) {
    fs::write(root.join("file1.txt"), "Hello World!").expect("write fixture");
    fs::write(root.join("file2.jpg"), "File 2 content").expect("write fixture");
    fs::write(root.join("file4.txt"), "Hello World!").expect("write fixture");
    fs::create_dir(root.join("subdir")).expect("create fixture dir");
    fs::write(root.join("subdir/subfile.txt"), "Subfile content").expect("write fixture");
}

fn service(conn: &Connection) -> IngestService<SqliteCatalogStore<'_>> {
    let store = SqliteCatalogStore::try_new(conn).expect("create store");
    IngestService::new(store, Fingerprinter::default())
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .expect("query row")
}

#[test]
fn duplicates_share_one_content_record() {
    let dir = tempfile::tempdir().expect("create temp dir");
    fs::write(dir.path().join("one.txt"), "same bytes").expect("write fixture");
    fs::write(dir.path().join("two.txt"), "same bytes").expect("write fixture");
    fs::create_dir(dir.path().join("sub")).expect("create fixture dir");
    fs::write(dir.path().join("sub/three.txt"), "other bytes").expect("write fixture");

    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);
    let repo = service
        .add_repository(dir.path().to_str().expect("utf8 temp path"), "fresh", false)
        .expect("add repository")
        .expect("repository should be inserted");

    let report = service
        .scan_into_repository(dir.path(), repo, &ScanOptions::default())
        .expect("scan repository");

    assert_eq!(report.files_seen, 3);
    assert_eq!(report.content_created, 2);
    assert_eq!(report.locations_created, 3);
    assert!(report.skipped.is_empty());
    assert!(!report.cancelled);
    assert_eq!(count(&conn, "content"), 2);
    assert_eq!(count(&conn, "location"), 3);

    let shared = Fingerprinter::default()
        .fingerprint_bytes(b"same bytes")
        .expect("fingerprint bytes");
    let locations = service.store().list_locations(&shared).expect("list locations");
    assert_eq!(locations.len(), 2);
    assert!(locations.iter().all(|location| location.repo_id == repo));
}

#[test]
fn rescanning_unchanged_directory_creates_nothing() {
    let dir = tempfile::tempdir().expect("create temp dir");
    create_testing_dir(dir.path());

    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);
    let repo = service
        .add_repository(dir.path().to_str().expect("utf8 temp path"), "Temp", false)
        .expect("add repository")
        .expect("repository should be inserted");

    let first = service
        .scan_into_repository(dir.path(), repo, &ScanOptions::default())
        .expect("scan repository");
    assert_eq!(first.files_seen, 4);
    assert_eq!(first.content_created, 3);
    assert_eq!(first.locations_created, 4);

    let second = service
        .scan_into_repository(dir.path(), repo, &ScanOptions::default())
        .expect("scan repository");
    assert_eq!(second.files_seen, 4);
    assert_eq!(second.content_created, 0);
    assert_eq!(second.locations_created, 0);
}

#[test]
fn same_content_in_second_repository_adds_locations_only() {
    let first_dir = tempfile::tempdir().expect("create temp dir");
    let second_dir = tempfile::tempdir().expect("create temp dir");
    create_testing_dir(first_dir.path());
    create_testing_dir(second_dir.path());

    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);
    let disk = service
        .add_repository("/disk", "Disk", false)
        .expect("add repository")
        .expect("repository should be inserted");
    let usb = service
        .add_repository("/usb", "USB", false)
        .expect("add repository")
        .expect("repository should be inserted");

    service
        .scan_into_repository(first_dir.path(), disk, &ScanOptions::default())
        .expect("scan repository");
    let report = service
        .scan_into_repository(second_dir.path(), usb, &ScanOptions::default())
        .expect("scan repository");

    assert_eq!(report.content_created, 0);
    assert_eq!(report.locations_created, 4);
    assert_eq!(count(&conn, "content"), 3);
    assert_eq!(count(&conn, "location"), 8);
}

#[test]
fn add_repository_allows_duplicate_path_on_request() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);

    let first = service
        .add_repository("/tmp", "A", false)
        .expect("add repository")
        .expect("repository should be inserted");
    let second = service
        .add_repository("/tmp", "B", true)
        .expect("add repository")
        .expect("repository should be inserted");
    assert_ne!(first, second);

    let found = service.store().find_repositories_by_path("/tmp").expect("find repositories");
    let ids: Vec<_> = found.iter().map(|repo| repo.repo_id).collect();
    assert_eq!(ids, vec![first, second]);
}

#[test]
fn add_repository_suppresses_duplicate_path_by_default() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);

    service
        .add_repository("/tmp", "A", false)
        .expect("add repository")
        .expect("repository should be inserted");
    assert_eq!(service.add_repository("/tmp", "B", false).expect("add repository"), None);

    let found = service.store().find_repositories_by_path("/tmp").expect("find repositories");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].description, "A");
    assert_eq!(count(&conn, "repository"), 1);
}

#[test]
fn empty_files_are_skipped_without_aborting() {
    let dir = tempfile::tempdir().expect("create temp dir");
    fs::write(dir.path().join("empty.txt"), "").expect("write fixture");
    fs::write(dir.path().join("full.txt"), "content").expect("write fixture");

    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);
    let repo = service
        .add_repository("/r", "R", false)
        .expect("add repository")
        .expect("repository should be inserted");

    let report = service
        .scan_into_repository(dir.path(), repo, &ScanOptions::default())
        .expect("scan repository");

    assert_eq!(report.files_seen, 2);
    assert_eq!(report.content_created, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, dir.path().join("empty.txt"));
    assert!(matches!(report.skipped[0].cause, SkipCause::Fingerprint(_)));
}

#[test]
fn filter_excludes_files_from_ingest() {
    let dir = tempfile::tempdir().expect("create temp dir");
    create_testing_dir(dir.path());

    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);
    let repo = service
        .add_repository("/r", "R", false)
        .expect("add repository")
        .expect("repository should be inserted");

    let options =
        ScanOptions::default().with_filter(extension_filter(&["jpg"]), FilterScope::FilesOnly);
    let report = service
        .scan_into_repository(dir.path(), repo, &options)
        .expect("scan repository");

    assert_eq!(report.files_seen, 1);
    assert_eq!(count(&conn, "content"), 1);
    assert_eq!(count(&conn, "location"), 1);
}

#[test]
fn unknown_repository_aborts_scan() {
    let dir = tempfile::tempdir().expect("create temp dir");
    create_testing_dir(dir.path());

    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);

    let err = service
        .scan_into_repository(dir.path(), 42, &ScanOptions::default())
        .expect_err("unknown repository must abort");
    assert!(matches!(
        err,
        IngestError::Store(StoreError::UnknownRepository(42))
    ));
    assert_eq!(count(&conn, "content"), 0);
    assert_eq!(count(&conn, "location"), 0);
}

#[test]
fn unknown_repository_is_rejected_even_for_empty_root() {
    let dir = tempfile::tempdir().expect("create temp dir");

    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);

    let err = service
        .scan_into_repository(dir.path(), 42, &ScanOptions::default())
        .expect_err("unknown repository must abort");
    assert!(matches!(
        err,
        IngestError::Store(StoreError::UnknownRepository(42))
    ));
}

#[test]
fn missing_root_is_a_hard_failure() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);
    let repo = service
        .add_repository("/r", "R", false)
        .expect("add repository")
        .expect("repository should be inserted");

    let err = service
        .scan_into_repository(dir.path().join("gone"), repo, &ScanOptions::default())
        .expect_err("missing root must abort");
    assert!(matches!(
        err,
        IngestError::Traverse(TraverseError::RootNotFound(_))
    ));
}

#[test]
fn pre_cancelled_scan_does_no_work() {
    let dir = tempfile::tempdir().expect("create temp dir");
    create_testing_dir(dir.path());

    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);
    let repo = service
        .add_repository("/r", "R", false)
        .expect("add repository")
        .expect("repository should be inserted");

    let token = CancellationToken::new();
    token.cancel();
    let report = service
        .scan_into_repository(
            dir.path(),
            repo,
            &ScanOptions::default().with_cancellation(token),
        )
        .expect("scan repository");

    assert!(report.cancelled);
    assert_eq!(report.files_seen, 0);
    assert_eq!(count(&conn, "content"), 0);
}

#[test]
fn cancellation_mid_scan_keeps_completed_work() {
    let dir = tempfile::tempdir().expect("create temp dir");
    create_testing_dir(dir.path());

    let conn = open_db_in_memory().expect("open in-memory db");
    let service = service(&conn);
    let repo = service
        .add_repository("/r", "R", false)
        .expect("add repository")
        .expect("repository should be inserted");

    let token = CancellationToken::new();
    let trigger = token.clone();
    let evaluated = Arc::new(AtomicUsize::new(0));
    // Cancel while the second file is being offered.
    let predicate: PathPredicate = Arc::new(move |_: &Path| {
        if evaluated.fetch_add(1, Ordering::SeqCst) == 1 {
            trigger.cancel();
        }
        true
    });
    let options = ScanOptions::default()
        .with_filter(predicate, FilterScope::FilesOnly)
        .with_cancellation(token);

    let report = service
        .scan_into_repository(dir.path(), repo, &options)
        .expect("scan repository");

    assert!(report.cancelled);
    assert_eq!(report.files_seen, 1);
    assert_eq!(report.locations_created, 1);
    assert_eq!(count(&conn, "location"), 1);
}

#[test]
fn configured_digest_is_used_for_identities() {
    let dir = tempfile::tempdir().expect("create temp dir");
    fs::write(dir.path().join("hello.txt"), "Hello World!").expect("write fixture");

    let conn = open_db_in_memory().expect("open in-memory db");
    let config = CatalogConfig {
        digest_algorithm: DigestAlgorithm::Sha256,
        ..CatalogConfig::default()
    };
    let store = SqliteCatalogStore::from_config(&conn, &config).expect("create store");
    let service = IngestService::from_config(store, &config);
    let repo = service
        .add_repository("/r", "R", false)
        .expect("add repository")
        .expect("repository should be inserted");

    service
        .scan_into_repository(dir.path(), repo, &ScanOptions::default())
        .expect("scan repository");

    let contents = service.store().list_contents().expect("list contents");
    assert_eq!(contents.len(), 1);
    assert_eq!(
        contents[0].content_id.as_str(),
        "7f83b1657ff1fc53b92dc18148a1d65dfc2d4b1fa3d677284addd200126d9069"
    );
}
