//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by catalog behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections wait on a locked database instead of failing fast,
//!   so concurrent writers serialize.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use crate::config::TableNames;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a catalog file with default table names.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_tables(path, &TableNames::default())
}

/// Opens an in-memory catalog with default table names.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_db_in_memory_with_tables(&TableNames::default())
}

/// Opens a catalog file and applies all pending migrations.
///
/// # Side effects
/// - Creates the file when it does not exist.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_with_tables(path: impl AsRef<Path>, tables: &TableNames) -> DbResult<Connection> {
    tables.validate()?;
    bootstrap("file", tables, || Connection::open(path))
}

/// Opens an in-memory catalog and applies all pending migrations.
pub fn open_db_in_memory_with_tables(tables: &TableNames) -> DbResult<Connection> {
    tables.validate()?;
    bootstrap("memory", tables, Connection::open_in_memory)
}

fn bootstrap(
    mode: &str,
    tables: &TableNames,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match connect() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, tables) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, tables: &TableNames) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn, tables)?;
    Ok(())
}
