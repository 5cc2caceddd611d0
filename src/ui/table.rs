use crate::storage::ResultSet;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub name: String,
    #[tabled(rename = "Rows")]
    pub rows: usize,
}

/// Table names with their row counts
pub fn tables_table(tables: &[(String, usize)]) -> String {
    if tables.is_empty() {
        return String::new();
    }

    let rows: Vec<TableRow> = tables
        .iter()
        .map(|(name, rows)| TableRow {
            name: name.clone(),
            rows: *rows,
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Render a query result; NULL cells print as `NULL`
pub fn result_table(result: &ResultSet) -> String {
    let mut builder = Builder::default();
    builder.push_record(result.columns.iter().cloned());
    for row in result.to_strings() {
        builder.push_record(row);
    }
    builder.build().with(Style::rounded()).to_string()
}
