//! Terminal output for the CLI

pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, empty, error, header, info, status, success, summary_row, warn};
pub use progress::Spinner;
pub use table::{result_table, tables_table};
pub use theme::{theme, Theme};
