// Registry Index - Core Library
// Exposes all modules for use in the loader CLI, the search server, and tests

pub mod config;
pub mod cursor;
pub mod db;
pub mod entities;
pub mod error;
pub mod loader;
pub mod locations;
pub mod logging;
pub mod normalize;
pub mod persons;
pub mod query;
pub mod share_table;
pub mod shareholders;
pub mod sources;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use cursor::SortCursor;
pub use db::{
    DocumentIndex, IndexDocument, BulkOutcome, BulkFailure, RunRecord, SqliteIndex,
    setup_database, count_documents, get_document, KNOWN_INDEXES,
};
pub use entities::{
    clean_record, CleanedEntity, CleaningContext, Role,
    Company, BusinessName, TaxPayer, Legislator, PersonRecord,
};
pub use error::{CursorError, IndexError, LoadError, QueryError, RecordError};
pub use loader::{run_load, LoadReport, LoadSummary, Loader};
pub use locations::{Location, LocationTable};
pub use normalize::{normalize_phone, derive_identity, DerivedIdentity, NationalityPolicy};
pub use persons::{extract_people, PersonDeduplicator, PersonRoleDocument};
pub use query::{search, SearchRequest, SearchResponse, SearchItem, Pagination, SortOrder};
pub use share_table::{parse_share_table, ShareCell};
pub use shareholders::{aggregate_shareholders, ShareholderAggregate, ShareholdingEntry};
pub use sources::{raw_records, cleaned_entities, RawRecord, SourceKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
