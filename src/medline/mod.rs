//! Medline retrieval: search, fetch, parse and clean up
//!
//! - `client` - [`MedlineClient`] and the search/fetch pipeline
//! - `responses` - streaming scanner for ESearch responses
//! - `parser` - Medline XML record parsing behind the [`RecordParser`] seam
//! - `cleanup` - per-field normalization rules
//! - `provider` - database profiles bundling syntax and cleanup rules

mod client;

pub mod cleanup;
pub mod models;
pub mod parser;
pub mod provider;
pub mod responses;

pub use client::{MedlineClient, SearchOutcome};
pub use cleanup::{CleanupOp, CleanupRule, MEDLINE_CLEANUP};
pub use models::{BibRecord, Field, FieldValue, PublicationDate};
pub use parser::{MedlineXmlParser, ParsedRecords, RecordParser};
pub use provider::Provider;
pub use responses::{ESearchScanner, ScanControl, SearchResult};
