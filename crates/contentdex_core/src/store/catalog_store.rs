//! Catalog store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the four catalog write/lookup operations over SQLite.
//! - Provide read queries backing listing use-cases.
//!
//! # Invariants
//! - Every operation is one atomic transaction (a single autocommit
//!   statement, or one `IMMEDIATE` transaction for checked inserts).
//! - Concurrent `record_content` calls for one identity leave exactly one
//!   row: the primary key plus `INSERT OR IGNORE` decide the race in SQLite.
//! - Read paths reject invalid persisted identities instead of masking them.

use crate::config::{CatalogConfig, TableNames};
use crate::db::migrations::has_table;
use crate::db::DbError;
use crate::model::content::{ContentId, ContentRecord, MetadataRef};
use crate::model::location::Location;
use crate::model::repository::{RepoId, Repository};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Catalog store error.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// `record_location` referenced a repository that does not exist.
    UnknownRepository(RepoId),
    /// A location or metadata link referenced content that does not exist.
    UnknownContent(ContentId),
    InvalidData(String),
    MissingRequiredTable(String),
    MissingRequiredColumn {
        table: String,
        column: &'static str,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UnknownRepository(id) => write!(f, "unknown repository: {id}"),
            Self::UnknownContent(id) => write!(f, "unknown content: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// `false` when the row already existed.
    pub created: bool,
}

/// Write contract used by ingest.
pub trait CatalogStore {
    /// Inserts content if absent.
    fn record_content(
        &self,
        content_id: &ContentId,
        metadata_ref: Option<MetadataRef>,
    ) -> StoreResult<RecordOutcome>;
    /// Always inserts a new repository row and returns its id.
    fn register_repository(&self, path: &str, description: &str) -> StoreResult<RepoId>;
    /// Returns every repository whose path equals `path` exactly.
    fn find_repositories_by_path(&self, path: &str) -> StoreResult<Vec<Repository>>;
    /// Inserts a location if absent; both references must exist.
    fn record_location(
        &self,
        repo_id: RepoId,
        content_id: &ContentId,
        observed_path: &str,
    ) -> StoreResult<RecordOutcome>;
}

/// Read queries for listing use-cases.
pub trait CatalogQuery {
    /// All content records ordered by identity.
    fn list_contents(&self) -> StoreResult<Vec<ContentRecord>>;
    /// All repositories ordered by id.
    fn list_repositories(&self) -> StoreResult<Vec<Repository>>;
    fn get_repository(&self, repo_id: RepoId) -> StoreResult<Option<Repository>>;
    /// Every observed location of one content identity.
    fn list_locations(&self, content_id: &ContentId) -> StoreResult<Vec<Location>>;
}

struct CatalogSql {
    insert_content: String,
    insert_repository: String,
    select_repositories_by_path: String,
    repository_exists: String,
    content_exists: String,
    insert_location: String,
    select_contents: String,
    select_repositories: String,
    select_repository: String,
    select_locations: String,
    attach_metadata: String,
}

impl CatalogSql {
    fn new(tables: &TableNames) -> Self {
        let TableNames {
            content,
            repository,
            location,
        } = tables;
        Self {
            insert_content: format!(
                "INSERT OR IGNORE INTO {content} (content_id, metadata_ref) VALUES (?1, ?2);"
            ),
            insert_repository: format!(
                "INSERT INTO {repository} (description, path) VALUES (?1, ?2);"
            ),
            select_repositories_by_path: format!(
                "SELECT repo_id, path, description
                 FROM {repository}
                 WHERE path = ?1
                 ORDER BY repo_id ASC;"
            ),
            repository_exists: format!(
                "SELECT EXISTS(SELECT 1 FROM {repository} WHERE repo_id = ?1);"
            ),
            content_exists: format!(
                "SELECT EXISTS(SELECT 1 FROM {content} WHERE content_id = ?1);"
            ),
            insert_location: format!(
                "INSERT OR IGNORE INTO {location} (repo_id, content_id, observed_path)
                 VALUES (?1, ?2, ?3);"
            ),
            select_contents: format!(
                "SELECT content_id, metadata_ref FROM {content} ORDER BY content_id ASC;"
            ),
            select_repositories: format!(
                "SELECT repo_id, path, description FROM {repository} ORDER BY repo_id ASC;"
            ),
            select_repository: format!(
                "SELECT repo_id, path, description FROM {repository} WHERE repo_id = ?1;"
            ),
            select_locations: format!(
                "SELECT repo_id, content_id, observed_path
                 FROM {location}
                 WHERE content_id = ?1
                 ORDER BY repo_id ASC, observed_path ASC;"
            ),
            attach_metadata: format!(
                "UPDATE {content} SET metadata_ref = ?2 WHERE content_id = ?1;"
            ),
        }
    }
}

/// SQLite-backed catalog store.
pub struct SqliteCatalogStore<'conn> {
    conn: &'conn Connection,
    sql: CatalogSql,
}

impl<'conn> SqliteCatalogStore<'conn> {
    /// Constructs a store over a migrated connection with default table names.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        Self::try_new_with_tables(conn, &TableNames::default())
    }

    /// Constructs a store using the table names from `config`.
    pub fn from_config(conn: &'conn Connection, config: &CatalogConfig) -> StoreResult<Self> {
        Self::try_new_with_tables(conn, &config.table_names)
    }

    pub fn try_new_with_tables(conn: &'conn Connection, tables: &TableNames) -> StoreResult<Self> {
        ensure_catalog_connection_ready(conn, tables)?;
        Ok(Self {
            conn,
            sql: CatalogSql::new(tables),
        })
    }

    /// Sets the weak metadata reference of existing content.
    ///
    /// This is the only mutation a content record ever receives.
    pub fn attach_metadata(
        &self,
        content_id: &ContentId,
        metadata_ref: Option<MetadataRef>,
    ) -> StoreResult<()> {
        let changed = self.conn.execute(
            &self.sql.attach_metadata,
            params![content_id.as_str(), metadata_ref],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownContent(content_id.clone()));
        }
        Ok(())
    }
}

impl CatalogStore for SqliteCatalogStore<'_> {
    fn record_content(
        &self,
        content_id: &ContentId,
        metadata_ref: Option<MetadataRef>,
    ) -> StoreResult<RecordOutcome> {
        let mut stmt = self.conn.prepare_cached(&self.sql.insert_content)?;
        let changed = stmt.execute(params![content_id.as_str(), metadata_ref])?;
        Ok(RecordOutcome {
            created: changed == 1,
        })
    }

    fn register_repository(&self, path: &str, description: &str) -> StoreResult<RepoId> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(&self.sql.insert_repository, params![description, path])?;
        let repo_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(repo_id)
    }

    fn find_repositories_by_path(&self, path: &str) -> StoreResult<Vec<Repository>> {
        let mut stmt = self
            .conn
            .prepare_cached(&self.sql.select_repositories_by_path)?;
        let mut rows = stmt.query([path])?;
        let mut repositories = Vec::new();
        while let Some(row) = rows.next()? {
            repositories.push(parse_repository_row(row)?);
        }
        Ok(repositories)
    }

    fn record_location(
        &self,
        repo_id: RepoId,
        content_id: &ContentId,
        observed_path: &str,
    ) -> StoreResult<RecordOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !exists_in_tx(&tx, &self.sql.repository_exists, params![repo_id])? {
            return Err(StoreError::UnknownRepository(repo_id));
        }
        if !exists_in_tx(&tx, &self.sql.content_exists, params![content_id.as_str()])? {
            return Err(StoreError::UnknownContent(content_id.clone()));
        }

        let changed = tx.execute(
            &self.sql.insert_location,
            params![repo_id, content_id.as_str(), observed_path],
        )?;
        tx.commit()?;

        Ok(RecordOutcome {
            created: changed == 1,
        })
    }
}

impl CatalogQuery for SqliteCatalogStore<'_> {
    fn list_contents(&self) -> StoreResult<Vec<ContentRecord>> {
        let mut stmt = self.conn.prepare(&self.sql.select_contents)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(ContentRecord {
                content_id: parse_content_id(row, "content_id")?,
                metadata_ref: row.get("metadata_ref")?,
            });
        }
        Ok(records)
    }

    fn list_repositories(&self) -> StoreResult<Vec<Repository>> {
        let mut stmt = self.conn.prepare(&self.sql.select_repositories)?;
        let mut rows = stmt.query([])?;
        let mut repositories = Vec::new();
        while let Some(row) = rows.next()? {
            repositories.push(parse_repository_row(row)?);
        }
        Ok(repositories)
    }

    fn get_repository(&self, repo_id: RepoId) -> StoreResult<Option<Repository>> {
        let mut stmt = self.conn.prepare(&self.sql.select_repository)?;
        let mut rows = stmt.query([repo_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_repository_row(row)?));
        }
        Ok(None)
    }

    fn list_locations(&self, content_id: &ContentId) -> StoreResult<Vec<Location>> {
        let mut stmt = self.conn.prepare(&self.sql.select_locations)?;
        let mut rows = stmt.query([content_id.as_str()])?;
        let mut locations = Vec::new();
        while let Some(row) = rows.next()? {
            locations.push(Location {
                repo_id: row.get("repo_id")?,
                content_id: parse_content_id(row, "content_id")?,
                observed_path: row.get("observed_path")?,
            });
        }
        Ok(locations)
    }
}

fn parse_repository_row(row: &Row<'_>) -> StoreResult<Repository> {
    Ok(Repository {
        repo_id: row.get("repo_id")?,
        path: row.get("path")?,
        description: row.get("description")?,
    })
}

fn parse_content_id(row: &Row<'_>, column: &str) -> StoreResult<ContentId> {
    let text: String = row.get(column)?;
    ContentId::parse(&text).map_err(|err| {
        StoreError::InvalidData(format!("invalid content id `{text}` in {column}: {err}"))
    })
}

fn exists_in_tx(
    tx: &Transaction<'_>,
    sql: &str,
    params: impl rusqlite::Params,
) -> StoreResult<bool> {
    let exists: i64 = tx.query_row(sql, params, |row| row.get(0))?;
    Ok(exists == 1)
}

fn ensure_catalog_connection_ready(conn: &Connection, tables: &TableNames) -> StoreResult<()> {
    let required: [(&str, &[&'static str]); 3] = [
        (tables.content.as_str(), &["content_id", "metadata_ref"]),
        (tables.repository.as_str(), &["repo_id", "description", "path"]),
        (
            tables.location.as_str(),
            &["repo_id", "content_id", "observed_path"],
        ),
    ];

    for (table, columns) in required {
        if !has_table(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table.to_string()));
        }
        for column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::MissingRequiredColumn {
                    table: table.to_string(),
                    column: *column,
                });
            }
        }
    }

    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
