//! imshelf-bibtex: BibTeX record codec for the imshelf reference store.
//!
//! Parses bibliography files into ordered, field-preserving records and
//! formats them back out. The formatter output reparses field-for-field
//! equal, so downstream tools can consume anything imshelf writes.

pub mod entry;
pub mod formatter;
pub mod parser;

pub use entry::{EntryType, Field, Record};
pub use formatter::{format_record, format_records};
pub use parser::{parse, ParseError};
