//! imshelf-core: path-addressed reference store.
//!
//! Each reference lives in a directory named by its slash-delimited path
//! under a configured root: one `reference.bib` plus any attached documents.
//! The two engines on top of the store are bulk import/merge (an external
//! bibliography export, annotated with collection paths and attachment
//! lists, materialized into the store) and export aggregation (a selected
//! subset of the store concatenated back into merged bibliography files).

pub mod attach;
pub mod config;
pub mod export;
pub mod fetch;
pub mod import;
pub mod path;
pub mod search;
pub mod select;
pub mod store;

pub use attach::{
    latest_in_watch_dir, place, InvalidTransferMode, PlaceOutcome, Placed, PlacementFailure,
    PlacementReport, TransferMode,
};
pub use config::{Config, ConfigError, ExportSpec};
pub use export::{run_export, run_exports, ExportError, ExportReport};
pub use fetch::{create_from_source, CreateError, FetchError, MetadataSource};
pub use import::{import_file, import_records, ImportError, ImportFailure, ImportReport};
pub use path::{InvalidPath, RefPath};
pub use search::{find, FoundRef};
pub use select::{Selector, SelectorError};
pub use store::{Store, StoreError};
