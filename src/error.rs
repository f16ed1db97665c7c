use std::result;

use crate::retry::RetryableError;
use thiserror::Error;

/// Error types for Medline retrieval operations
#[derive(Error, Debug)]
pub enum MedlineError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Generic API error with HTTP status code
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// Response body stream broke while it was being scanned
    #[error("Transport error while reading response: {0}")]
    TransportError(String),

    /// API rate limit exceeded
    #[error("API rate limit exceeded")]
    RateLimitExceeded,

    /// XML parsing failed
    #[error("XML parsing failed: {0}")]
    XmlError(String),

    /// The search response carried a count that is not an integer
    #[error("Invalid result count in search response: {value:?}")]
    CountParseError { value: String },

    /// Identifiers were listed before any result count
    #[error("Search response listed identifiers before a result count")]
    MissingCount,

    /// Query text could not be parsed into a query tree
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Identifier cannot be sent to the fetch endpoint
    #[error("Invalid identifier: {id:?}")]
    InvalidIdentifier { id: String },
}

pub type Result<T> = result::Result<T, MedlineError>;

/// Coarse classification of a [`MedlineError`]
///
/// Callers use this to tell "the network failed" apart from "the network
/// worked but the payload was unreadable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport or connectivity failure during search or fetch
    Retrieval,
    /// Malformed or unparsable response payload
    Parse,
    /// Rejected before any request was made
    InvalidInput,
}

impl MedlineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MedlineError::RequestError(_)
            | MedlineError::ApiError { .. }
            | MedlineError::TransportError(_)
            | MedlineError::RateLimitExceeded => ErrorKind::Retrieval,
            MedlineError::XmlError(_)
            | MedlineError::CountParseError { .. }
            | MedlineError::MissingCount => ErrorKind::Parse,
            MedlineError::InvalidQuery(_) | MedlineError::InvalidIdentifier { .. } => {
                ErrorKind::InvalidInput
            }
        }
    }

    pub fn is_retrieval(&self) -> bool {
        self.kind() == ErrorKind::Retrieval
    }

    pub fn is_parse(&self) -> bool {
        self.kind() == ErrorKind::Parse
    }

    /// Single-line message suitable for showing to an end user
    ///
    /// The `Display` implementation carries the technical detail; this one does not.
    pub fn user_message(&self) -> String {
        match self {
            MedlineError::RateLimitExceeded => {
                "Too many requests to Medline, please try again shortly".to_string()
            }
            MedlineError::ApiError { status: 200, message } => {
                format!("Medline rejected the search: {}", message)
            }
            MedlineError::RequestError(_)
            | MedlineError::ApiError { .. }
            | MedlineError::TransportError(_) => "Error while fetching from Medline".to_string(),
            MedlineError::CountParseError { .. } | MedlineError::MissingCount => {
                "Error while parsing ID list".to_string()
            }
            MedlineError::XmlError(_) => "Error while parsing Medline records".to_string(),
            MedlineError::InvalidQuery(_) => "The search query could not be understood".to_string(),
            MedlineError::InvalidIdentifier { id } => format!("Invalid PubMed ID: {}", id),
        }
    }
}

impl From<quick_xml::Error> for MedlineError {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(io) => MedlineError::TransportError(io.to_string()),
            other => MedlineError::XmlError(other.to_string()),
        }
    }
}

impl RetryableError for MedlineError {
    fn is_retryable(&self) -> bool {
        match self {
            MedlineError::RequestError(err) => {
                if err.is_timeout() || err.is_connect() {
                    return true;
                }

                if let Some(status) = err.status() {
                    return status.is_server_error() || status.as_u16() == 429;
                }

                !err.is_builder() && !err.is_redirect() && !err.is_decode()
            }

            MedlineError::RateLimitExceeded => true,

            // 200 means the server answered and refused the query
            MedlineError::ApiError { status, .. } => {
                (*status >= 500 && *status < 600) || *status == 429
            }

            MedlineError::TransportError(_)
            | MedlineError::XmlError(_)
            | MedlineError::CountParseError { .. }
            | MedlineError::MissingCount
            | MedlineError::InvalidQuery(_)
            | MedlineError::InvalidIdentifier { .. } => false,
        }
    }

    fn retry_reason(&self) -> &str {
        match self {
            MedlineError::RequestError(err) if err.is_timeout() => "Request timeout",
            MedlineError::RequestError(err) if err.is_connect() => "Connection error",
            MedlineError::RequestError(_) => "Network error",
            MedlineError::RateLimitExceeded => "Rate limit exceeded",
            MedlineError::ApiError { status, .. } => match status {
                429 => "Rate limit exceeded",
                500..=599 => "Server error",
                _ => "API error",
            },
            MedlineError::TransportError(_) => "Response stream interrupted",
            MedlineError::XmlError(_)
            | MedlineError::CountParseError { .. }
            | MedlineError::MissingCount => "Invalid XML response",
            MedlineError::InvalidQuery(_) | MedlineError::InvalidIdentifier { .. } => {
                "Invalid input"
            }
        }
    }
}
