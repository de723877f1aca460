//! Streaming delimited-file parser.
//!
//! Reads a comma-separated file one line at a time into a [`DataTable`],
//! reporting progress and honoring cooperative cancellation. Field
//! splitting is a plain comma split; quoted fields with embedded commas
//! are a known limitation of the format this parser accepts.

pub mod parse;
pub mod table;

pub use parse::{count_lines, parse_file, TableParseOutcome};
pub use table::DataTable;
