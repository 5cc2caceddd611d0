//! Portable SQL dumper
//!
//! Converts a live database into a script that recreates its schema and
//! data when executed on an empty database. Value quoting is delegated to
//! SQLite's own `quote()` function.

use crate::Result;
use crate::storage::{Database, schema};
use tracing::debug;

/// A table definition read from the schema catalog
#[derive(Debug, Clone)]
struct TableDef {
    name: String,
    sql: String,
}

impl TableDef {
    fn is_internal(&self) -> bool {
        self.name.starts_with("sqlite_")
    }

    fn is_virtual(&self) -> bool {
        self.sql
            .get(..20)
            .map(|head| head.eq_ignore_ascii_case("CREATE VIRTUAL TABLE"))
            .unwrap_or(false)
    }

    /// Statement recreating this table, if any
    fn recreate_statement(&self) -> Option<String> {
        const CREATE_TABLE: &str = "CREATE TABLE ";

        match self.name.as_str() {
            "sqlite_sequence" => return Some("DELETE FROM \"sqlite_sequence\";".to_string()),
            "sqlite_stat1" => return Some("ANALYZE sqlite_schema;".to_string()),
            _ if self.is_internal() => return None,
            _ => {}
        }

        if self.is_virtual() {
            return Some(format!(
                "INSERT INTO sqlite_schema(type,name,tbl_name,rootpage,sql)VALUES('table',{0},{0},0,{1});",
                schema::quote_literal(&self.name),
                schema::quote_literal(&self.sql),
            ));
        }

        let is_create_table = self
            .sql
            .get(..CREATE_TABLE.len())
            .map(|head| head.eq_ignore_ascii_case(CREATE_TABLE))
            .unwrap_or(false);
        if is_create_table {
            Some(format!(
                "CREATE TABLE IF NOT EXISTS {};",
                &self.sql[CREATE_TABLE.len()..]
            ))
        } else {
            Some(format!("{};", self.sql))
        }
    }
}

/// Serialize a database to a portable SQL script.
///
/// Returns `""` when the database has no tables. Any engine error aborts
/// the dump; a partial script is never returned.
pub fn to_portable_sql(db: &Database) -> Result<String> {
    let mut tables = Vec::new();
    db.for_each_row(schema::SELECT_TABLE_SCHEMA, |row| {
        tables.push(TableDef {
            name: row.get(0)?,
            sql: row.get(2)?,
        });
        Ok(())
    })?;

    if tables.is_empty() {
        return Ok(String::new());
    }

    let mut lines = vec![
        "BEGIN TRANSACTION;".to_string(),
        "PRAGMA writable_schema=ON;".to_string(),
    ];

    for table in &tables {
        if let Some(statement) = table.recreate_statement() {
            lines.push(statement);
        }
    }

    for table in tables.iter().filter(|t| !t.is_internal() && !t.is_virtual()) {
        let columns = db.column_names(&table.name)?;
        let select = schema::select_insert_statements(&table.name, &columns);
        db.for_each_row(&select, |row| {
            lines.push(row.get(0)?);
            Ok(())
        })?;
    }

    db.for_each_row(schema::SELECT_AUXILIARY_SCHEMA, |row| {
        let sql: String = row.get(0)?;
        lines.push(format!("{};", sql));
        Ok(())
    })?;

    lines.push("PRAGMA writable_schema=OFF;".to_string());
    lines.push("COMMIT;".to_string());

    debug!(tables = tables.len(), lines = lines.len(), "Dumped database");
    Ok(lines.join("\n"))
}
