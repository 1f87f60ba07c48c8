pub mod format;
pub mod wide_column;
