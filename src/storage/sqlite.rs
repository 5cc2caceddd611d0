//! SQLite engine wrapper

use std::path::Path;
use rusqlite::backup::Progress;
use rusqlite::types::Value;
use rusqlite::{Batch, Connection, DatabaseName, Row};
use crate::Result;
use super::schema;

/// Columns and rows returned by the last statement of an `execute` call
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render every value as display text
    pub fn to_strings(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(value_to_string).collect())
            .collect()
    }
}

/// Display text of a SQLite value
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Live database handle. Owned by exactly one session.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a fresh in-memory database without schema
    pub fn open_empty() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open a serialized database image into memory.
    ///
    /// The image is staged in a temporary file and restored through the
    /// online backup API, so bytes that are not a SQLite image fail here.
    pub fn open_from_bytes(image: &[u8]) -> Result<Self> {
        let staged = tempfile::NamedTempFile::new()?;
        std::fs::write(staged.path(), image)?;
        Self::open_image_file(staged.path())
    }

    /// Copy a database file into memory; the file itself is never written
    pub fn open_image_file(path: &Path) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.restore(DatabaseName::Main, path, None::<fn(Progress)>)?;
        let db = Self { conn };
        // Forces the restored pages to be parsed so corrupt images fail early
        db.table_names()?;
        Ok(db)
    }

    /// Export the current database image.
    ///
    /// Callers must not export a database without tables.
    pub fn export_bytes(&self) -> Result<Vec<u8>> {
        let staged = tempfile::NamedTempFile::new()?;
        self.conn.backup(DatabaseName::Main, staged.path(), None)?;
        Ok(std::fs::read(staged.path())?)
    }

    /// Reopen the handle from its own image.
    ///
    /// A script that writes `sqlite_schema` directly (virtual tables in a
    /// dump) leaves the connection with a stale schema until it is reopened.
    pub fn reload(self) -> Result<Self> {
        if self.table_names()?.is_empty() {
            return Ok(self);
        }
        Self::open_from_bytes(&self.export_bytes()?)
    }

    /// Execute one or more statements.
    ///
    /// Returns the result set of the last statement that produced columns,
    /// or `None` when no statement did.
    pub fn execute(&self, sql: &str) -> Result<Option<ResultSet>> {
        let mut last = None;
        let mut batch = Batch::new(&self.conn, sql);
        while let Some(mut stmt) = batch.next()? {
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            if columns.is_empty() {
                stmt.execute([])?;
                continue;
            }

            let width = columns.len();
            let mut rows = Vec::new();
            let mut cursor = stmt.query([])?;
            while let Some(row) = cursor.next()? {
                let values = (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows.push(values);
            }
            last = Some(ResultSet { columns, rows });
        }
        Ok(last)
    }

    /// Run a query and hand every row to `f`
    pub fn for_each_row<F>(&self, sql: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&Row<'_>) -> Result<()>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            f(row)?;
        }
        Ok(())
    }

    /// Names of user tables, in name order
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.for_each_row(schema::SELECT_TABLE_NAMES, |row| {
            names.push(row.get(0)?);
            Ok(())
        })?;
        Ok(names)
    }

    /// Column names of a table
    pub fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let mut columns = Vec::new();
        self.for_each_row(&schema::table_info(table), |row| {
            columns.push(row.get(1)?);
            Ok(())
        })?;
        Ok(columns)
    }

    /// Count rows in a table
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", schema::quote_identifier(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
