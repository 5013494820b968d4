use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::{error::Result, labels::PatternShape, persist::LabelMode};

pub const DB_FILE: &str = "labels.db";

/// Idle read connections kept open.
const MAX_READERS: usize = 8;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS cf_spo (key BLOB PRIMARY KEY, value BLOB NOT NULL) WITHOUT ROWID;
    CREATE TABLE IF NOT EXISTS cf_s   (key BLOB PRIMARY KEY, value BLOB NOT NULL) WITHOUT ROWID;
    CREATE TABLE IF NOT EXISTS cf_p   (key BLOB PRIMARY KEY, value BLOB NOT NULL) WITHOUT ROWID;
    CREATE TABLE IF NOT EXISTS cf_any (key BLOB PRIMARY KEY, value BLOB NOT NULL) WITHOUT ROWID;

    CREATE TABLE IF NOT EXISTS meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS node_ids (
        id   INTEGER PRIMARY KEY,
        term TEXT NOT NULL
    );
"#;

/// One table per lookup step group. SPO also holds S P _ keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    Spo,
    S,
    P,
    Any,
}

impl ColumnFamily {
    pub const ALL: [ColumnFamily; 4] = [
        ColumnFamily::Spo,
        ColumnFamily::S,
        ColumnFamily::P,
        ColumnFamily::Any,
    ];

    pub fn for_shape(shape: PatternShape) -> Self {
        match shape {
            PatternShape::Spo | PatternShape::SpAny => ColumnFamily::Spo,
            PatternShape::SAnyAny => ColumnFamily::S,
            PatternShape::AnyPAny => ColumnFamily::P,
            PatternShape::AnyAnyAny => ColumnFamily::Any,
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            ColumnFamily::Spo => "cf_spo",
            ColumnFamily::S => "cf_s",
            ColumnFamily::P => "cf_p",
            ColumnFamily::Any => "cf_any",
        }
    }
}

/// Everything one commit writes.
#[derive(Debug, Default)]
pub struct EngineBatch {
    pub puts: Vec<(ColumnFamily, Vec<u8>, Vec<u8>)>,
    pub nodes: Vec<(u64, String)>,
    pub meta: Vec<(String, String)>,
}

impl EngineBatch {
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.nodes.is_empty() && self.meta.is_empty()
    }
}

/// Key-value tables in one SQLite database. A single writer connection
/// applies batches in a transaction; readers use their own connections and
/// only ever see committed data.
pub struct Engine {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
}

impl Engine {
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(DB_FILE);
        let conn = Connection::open(&path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("{} opened with journal_mode={mode}", path.display());
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path,
            writer: Mutex::new(conn),
            readers: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_reader(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Ok(Connection::open_with_flags(&self.path, flags)?)
    }

    fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let pooled = self.readers.lock().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => self.open_reader()?,
        };
        let out = f(&conn);
        let mut idle = self.readers.lock();
        if idle.len() < MAX_READERS {
            idle.push(conn);
        }
        out
    }

    pub fn get(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_reader(|conn| {
            let sql = format!("SELECT value FROM {} WHERE key = ?1", cf.table());
            let mut stmt = conn.prepare_cached(&sql)?;
            Ok(stmt
                .query_row([key], |row| row.get::<_, Vec<u8>>(0))
                .optional()?)
        })
    }

    /// Apply a batch atomically. In merge mode a put appends to any value
    /// already stored under the key.
    pub fn write(&self, batch: EngineBatch, mode: LabelMode) -> Result<()> {
        let mut conn = self.writer.lock();
        let tx = conn.transaction()?;
        for (cf, key, value) in batch.puts {
            let value = match mode {
                LabelMode::Overwrite => value,
                LabelMode::Merge => {
                    let select = format!("SELECT value FROM {} WHERE key = ?1", cf.table());
                    let existing: Option<Vec<u8>> = tx
                        .prepare_cached(&select)?
                        .query_row([&key], |row| row.get(0))
                        .optional()?;
                    match existing {
                        Some(mut old) => {
                            old.extend_from_slice(&value);
                            old
                        }
                        None => value,
                    }
                }
            };
            let insert = format!(
                "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
                cf.table()
            );
            tx.prepare_cached(&insert)?.execute(params![key, value])?;
        }
        for (id, term) in batch.nodes {
            tx.prepare_cached("INSERT INTO node_ids (id, term) VALUES (?1, ?2)")?
                .execute(params![id as i64, term])?;
        }
        for (key, value) in batch.meta {
            tx.prepare_cached("INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)")?
                .execute(params![key, value])?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn scan(&self, cf: ColumnFamily) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.with_reader(|conn| {
            let sql = format!("SELECT key, value FROM {} ORDER BY key", cf.table());
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn count(&self, cf: ColumnFamily) -> Result<u64> {
        self.with_reader(|conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", cf.table());
            let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    /// Database size from the page count, WAL excluded.
    pub fn approximate_size(&self) -> Result<u64> {
        let conn = self.writer.lock();
        let pages: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((pages * page_size) as u64)
    }

    pub fn compact(&self) -> Result<()> {
        let conn = self.writer.lock();
        conn.execute_batch("VACUUM")?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }

    pub fn meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.writer.lock();
        Ok(conn
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.writer.lock();
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn load_nodes(&self) -> Result<Vec<(u64, String)>> {
        let conn = self.writer.lock();
        let mut stmt = conn.prepare("SELECT id, term FROM node_ids ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                Ok((id as u64, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
