//! # Medline Fetcher
//!
//! Search and retrieve bibliographic records from NCBI PubMed / Medline through
//! the E-utilities API.
//!
//! A search runs in two phases. The query is rendered into the provider's
//! syntax and sent to ESearch, whose response is scanned as it streams in for
//! the matching identifiers. All identifiers are then fetched from EFetch in a
//! single request, parsed into [`BibRecord`]s and cleaned up.
//!
//! ## Features
//!
//! - **Query language**: `author:Smith AND (title:"deep learning" OR year:2018)`
//! - **Streaming search**: the ESearch body is dropped as soon as the id list is read
//! - **Batch fetch**: any number of ids costs one EFetch request
//! - **NCBI friendly**: token bucket rate limiting and retries with backoff
//!
//! ## Quick Start
//!
//! ```no_run
//! use medline_fetcher::MedlineClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MedlineClient::new();
//!
//!     let records = client.search("author:Smith AND year-range:2018-2021").await?;
//!     for record in &records {
//!         println!("{}: {}", record.pmid().unwrap_or("?"), record.title().unwrap_or(""));
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Building queries in code
//!
//! ```
//! use medline_fetcher::{MedlineClient, QueryNode};
//!
//! let client = MedlineClient::new();
//! let query = QueryNode::and(vec![
//!     QueryNode::field("author", "Smith"),
//!     QueryNode::field("year", "2018"),
//! ]);
//!
//! assert_eq!(
//!     client.transform(&query).as_deref(),
//!     Some("au:Smith AND sd:2018 AND ed:2018")
//! );
//! ```

pub mod config;
pub mod error;
pub mod medline;
pub mod query;
pub mod rate_limit;
pub mod retry;

// Re-export main types for convenience
pub use config::ClientConfig;
pub use error::{ErrorKind, MedlineError, Result};
pub use medline::{
    BibRecord, Field, FieldValue, MedlineClient, Provider, SearchOutcome, SearchResult,
};
pub use query::{QueryNode, parse_query};
pub use retry::RetryConfig;
