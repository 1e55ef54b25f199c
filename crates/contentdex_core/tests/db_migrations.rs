use contentdex_core::db::migrations::{has_table, latest_version};
use contentdex_core::db::{open_db, open_db_in_memory, open_db_in_memory_with_tables, DbError};
use contentdex_core::{ConfigError, TableNames};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().expect("open in-memory db");

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "content",
        "repository",
        "location",
        "publication",
        "author",
        "topic",
        "publication_author",
        "publication_topic",
    ] {
        assert!(has_table(&conn, table).expect("check table"), "table {table} does not exist");
    }
}

#[test]
fn opening_same_catalog_twice_is_idempotent() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("catalog.sqlite");

    let conn_first = open_db(&path).expect("open file db");
    conn_first
        .execute(
            "INSERT INTO repository (description, path) VALUES ('Temp', '/tmp');",
            [],
        )
        .expect("execute sql");
    drop(conn_first);

    let conn_second = open_db(&path).expect("open file db");
    assert_eq!(schema_version(&conn_second), latest_version());
    let repositories: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM repository;", [], |row| row.get(0))
        .expect("query row");
    assert_eq!(repositories, 1);
}

#[test]
fn opening_catalog_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("future.sqlite");

    let conn = Connection::open(&path).expect("open raw connection");
    conn.execute_batch("PRAGMA user_version = 999;").expect("execute sql");
    drop(conn);

    match open_db(&path).expect_err("newer schema must be rejected") {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn table_name_overrides_rename_catalog_tables_only() {
    let tables = TableNames {
        content: "blob".to_string(),
        repository: "volume".to_string(),
        location: "sighting".to_string(),
    };
    let conn = open_db_in_memory_with_tables(&tables).expect("open in-memory db");

    assert!(has_table(&conn, "blob").expect("check table"));
    assert!(has_table(&conn, "volume").expect("check table"));
    assert!(has_table(&conn, "sighting").expect("check table"));
    assert!(!has_table(&conn, "content").expect("check table"));
    assert!(has_table(&conn, "publication").expect("check table"));
}

#[test]
fn invalid_table_names_are_rejected_before_touching_the_file() {
    let tables = TableNames {
        content: "content; DROP TABLE x".to_string(),
        ..TableNames::default()
    };
    let err = open_db_in_memory_with_tables(&tables)
        .expect_err("invalid table names must be rejected");
    assert!(matches!(
        err,
        DbError::Config(ConfigError::InvalidTableName { role: "content", .. })
    ));
}

#[test]
fn metadata_table_names_cannot_be_reused_for_catalog_tables() {
    let tables = TableNames {
        content: "publication".to_string(),
        ..TableNames::default()
    };
    let err = open_db_in_memory_with_tables(&tables)
        .expect_err("metadata table name must be rejected");
    assert!(matches!(
        err,
        DbError::Config(ConfigError::ReservedTableName { role: "content", .. })
    ));
}

#[test]
fn foreign_keys_are_enabled() {
    let conn = open_db_in_memory().expect("open in-memory db");
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("query row");
    assert_eq!(enabled, 1);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .expect("query row")
}
