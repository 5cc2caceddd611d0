//! Catalog queries used for introspection and dumping

/// User tables, in name order
pub const SELECT_TABLE_NAMES: &str = r#"
SELECT name FROM sqlite_schema
WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
ORDER BY name
"#;

/// Table definitions to recreate, `sqlite_sequence` last so that it exists
/// by the time its rows are cleared
pub const SELECT_TABLE_SCHEMA: &str = r#"
SELECT name, type, sql FROM sqlite_schema
WHERE sql NOT NULL AND type = 'table'
ORDER BY name = 'sqlite_sequence', name
"#;

/// Indexes, triggers and views, recreated after the data is loaded
pub const SELECT_AUXILIARY_SCHEMA: &str = r#"
SELECT sql FROM sqlite_schema
WHERE sql NOT NULL AND type IN ('index', 'trigger', 'view')
ORDER BY type = 'view' DESC, name
"#;

/// Escape an identifier for use inside double quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape a value for use inside single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Column list of a table
pub fn table_info(table: &str) -> String {
    format!("PRAGMA table_info({})", quote_identifier(table))
}

/// A query producing one `INSERT` statement per row of `table`,
/// with every value quoted by SQLite itself.
pub fn select_insert_statements(table: &str, columns: &[String]) -> String {
    let values = columns
        .iter()
        .map(|column| format!("quote({})", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(" || ',' || ");
    let prefix = quote_literal(&format!("INSERT INTO {} VALUES(", quote_identifier(table)));
    format!(
        "SELECT {} || {} || ');' FROM {}",
        prefix,
        values,
        quote_identifier(table)
    )
}
