//! ESearch response scanning
//!
//! The search endpoint answers with an `eSearchResult` document. Only the first
//! `Count` and the `IdList` matter, so the body is scanned as a stream of events
//! and dropped as soon as the identifier list closes.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufRead;
use tracing::{debug, trace};

use crate::error::{MedlineError, Result};

/// Identifiers returned by one search call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identifiers in server relevance order
    pub ids: Vec<String>,
    /// Number of matches reported by the server, which may exceed `ids.len()`
    pub total_count: usize,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether the server held back matches beyond the returned page
    pub fn is_truncated(&self) -> bool {
        self.total_count > self.ids.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    BeforeCount,
    InCount,
    AfterCount,
    InList,
    Done,
}

/// What the caller should do after feeding an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    /// Everything needed has been seen; stop reading the body
    Stop,
}

/// Event-driven scanner for `eSearchResult` documents
///
/// Feed it events until it answers [`ScanControl::Stop`], then call
/// [`ESearchScanner::finish`].
#[derive(Debug)]
pub struct ESearchScanner {
    state: ScanState,
    depth: usize,
    count: Option<usize>,
    count_text: String,
    ids: Vec<String>,
    current_id: Option<String>,
    error_text: Option<String>,
}

impl Default for ESearchScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ESearchScanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::BeforeCount,
            depth: 0,
            count: None,
            count_text: String::new(),
            ids: Vec::new(),
            current_id: None,
            error_text: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == ScanState::Done
    }

    pub fn feed(&mut self, event: &Event<'_>) -> Result<ScanControl> {
        if self.state == ScanState::Done {
            return Ok(ScanControl::Stop);
        }

        match event {
            Event::Start(e) => {
                self.depth += 1;
                self.open(e.local_name().as_ref());
            }
            Event::Empty(e) => {
                self.depth += 1;
                let name = e.local_name();
                self.open(name.as_ref());
                let control = self.close(name.as_ref())?;
                self.depth -= 1;
                return Ok(control);
            }
            Event::Text(e) => self.capture(&e.unescape()?),
            Event::CData(e) => self.capture(&String::from_utf8_lossy(e.as_ref())),
            Event::End(e) => {
                let control = self.close(e.local_name().as_ref())?;
                self.depth = self.depth.saturating_sub(1);
                return Ok(control);
            }
            Event::Eof => return Ok(ScanControl::Stop),
            _ => {}
        }

        Ok(ScanControl::Continue)
    }

    fn capture(&mut self, text: &str) {
        if self.state == ScanState::InCount {
            self.count_text.push_str(text);
        } else if let Some(id) = self.current_id.as_mut() {
            id.push_str(text);
        } else if let Some(error) = self.error_text.as_mut() {
            error.push_str(text);
        }
    }

    fn open(&mut self, name: &[u8]) {
        match (self.state, name) {
            (ScanState::BeforeCount, b"Count") => self.state = ScanState::InCount,
            (ScanState::BeforeCount | ScanState::AfterCount, b"IdList") => {
                self.state = ScanState::InList
            }
            (ScanState::InList, b"Id") => self.current_id = Some(String::new()),
            // direct child of eSearchResult
            (_, b"ERROR") if self.depth == 2 => self.error_text = Some(String::new()),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) -> Result<ScanControl> {
        match (self.state, name) {
            (ScanState::InCount, b"Count") => {
                let value = self.count_text.trim();
                let count = value
                    .parse::<usize>()
                    .map_err(|_| MedlineError::CountParseError {
                        value: value.to_string(),
                    })?;
                trace!(count, "Read result count");
                self.count = Some(count);
                self.state = ScanState::AfterCount;
            }
            (ScanState::InList, b"Id") => {
                if let Some(id) = self.current_id.take() {
                    let id = id.trim();
                    if !id.is_empty() {
                        self.ids.push(id.to_string());
                    }
                }
            }
            (ScanState::InList, b"IdList") => {
                if self.count.is_none() && !self.ids.is_empty() {
                    return Err(MedlineError::MissingCount);
                }
                self.state = ScanState::Done;
                return Ok(ScanControl::Stop);
            }
            (_, b"ERROR") => {
                if let Some(message) = self.error_text.take() {
                    return Err(MedlineError::ApiError {
                        status: 200,
                        message: message.trim().to_string(),
                    });
                }
            }
            _ => {}
        }
        Ok(ScanControl::Continue)
    }

    /// Result of the scan so far
    ///
    /// A document that ends inside `Count` or `IdList` is incomplete and fails.
    pub fn finish(self) -> Result<SearchResult> {
        match self.state {
            ScanState::InCount | ScanState::InList => Err(MedlineError::XmlError(
                "Search response ended before the identifier list was complete".to_string(),
            )),
            _ if self.count.is_none() && !self.ids.is_empty() => Err(MedlineError::MissingCount),
            _ => Ok(SearchResult {
                ids: self.ids,
                total_count: self.count.unwrap_or(0),
            }),
        }
    }
}

/// Scan a complete in-memory search response
pub fn scan_search_response(body: &[u8]) -> Result<SearchResult> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut scanner = ESearchScanner::new();
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?;
        if scanner.feed(&event)? == ScanControl::Stop {
            break;
        }
        buf.clear();
    }
    scanner.finish()
}

/// Scan a search response as it arrives
///
/// Returns as soon as the identifier list closes; whatever is left in `body` is
/// never read.
pub async fn scan_search_stream<R>(body: R) -> Result<SearchResult>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut scanner = ESearchScanner::new();
    let mut buf = Vec::new();
    let mut events = 0usize;
    loop {
        let event = reader.read_event_into_async(&mut buf).await?;
        events += 1;
        if scanner.feed(&event)? == ScanControl::Stop {
            break;
        }
        buf.clear();
    }

    debug!(
        events,
        bytes_read = reader.buffer_position(),
        short_circuit = scanner.is_done(),
        "Scanned search response"
    );
    scanner.finish()
}
