mod efetch;
mod esearch;

use std::sync::Arc;

use reqwest::{Client, Response};
use tracing::{debug, info, instrument, warn};

use super::cleanup;
use super::models::BibRecord;
use super::parser::{MedlineXmlParser, RecordParser};
use super::provider::Provider;
use crate::config::ClientConfig;
use crate::error::{MedlineError, Result};
use crate::query::{QueryNode, parse_query};
use crate::rate_limit::RateLimiter;
use crate::retry::with_retry;

/// Client for searching and fetching Medline records
///
/// One call to [`MedlineClient::perform_search`] costs at most one search
/// request and one fetch request. The client holds no per-call state and is
/// cheap to clone; clones share the rate limiter.
#[derive(Clone)]
pub struct MedlineClient {
    client: Client,
    pub(crate) base_url: String,
    rate_limiter: RateLimiter,
    config: ClientConfig,
    provider: Provider,
    parser: Arc<dyn RecordParser>,
}

/// Records returned by a search together with what the server reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub records: Vec<BibRecord>,
    /// Matches reported by the search endpoint
    pub total_count: usize,
    /// Whether more matches exist than were fetched
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineStage {
    Idle,
    Searching,
    Fetching,
    Done,
    Empty,
}

impl PipelineStage {
    fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Searching => "searching",
            PipelineStage::Fetching => "fetching",
            PipelineStage::Done => "done",
            PipelineStage::Empty => "empty",
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug!(from = self.as_str(), to = next.as_str(), "Pipeline stage");
        *self = next;
    }
}

impl MedlineClient {
    /// Create a client with default configuration
    ///
    /// Uses NCBI's anonymous rate limit (3 requests/second).
    ///
    /// ```
    /// use medline_fetcher::MedlineClient;
    ///
    /// let client = MedlineClient::new();
    /// ```
    pub fn new() -> Self {
        Self::with_config(ClientConfig::new())
    }

    /// Create a client with custom configuration
    ///
    /// ```
    /// use medline_fetcher::{ClientConfig, MedlineClient};
    ///
    /// let config = ClientConfig::new()
    ///     .with_api_key("your_api_key_here")
    ///     .with_email("researcher@university.edu");
    ///
    /// let client = MedlineClient::with_config(config);
    /// ```
    pub fn with_config(config: ClientConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.effective_user_agent())
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self::from_parts(client, config)
    }

    /// Create a client around an existing HTTP client
    pub fn with_client(client: Client) -> Self {
        Self::from_parts(client, ClientConfig::new())
    }

    fn from_parts(client: Client, config: ClientConfig) -> Self {
        Self {
            client,
            base_url: config.effective_base_url().to_string(),
            rate_limiter: config.create_rate_limiter(),
            config,
            provider: Provider::default(),
            parser: Arc::new(MedlineXmlParser),
        }
    }

    /// Use another provider profile
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Use another record parser for fetch responses
    pub fn with_parser<P: RecordParser + 'static>(mut self, parser: P) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Render `query` in this client's provider syntax
    pub fn transform(&self, query: &QueryNode) -> Option<String> {
        self.provider.transformer().transform(query)
    }

    /// Apply the provider's cleanup rules to one record
    pub fn cleanup(&self, record: &mut BibRecord) {
        cleanup::cleanup(record, self.provider.cleanup_rules);
    }

    /// Parse `query` and run [`MedlineClient::perform_search`]
    ///
    /// ```no_run
    /// use medline_fetcher::MedlineClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = MedlineClient::new();
    ///     let records = client.search("author:Smith AND year:2018").await?;
    ///     println!("Fetched {} records", records.len());
    ///     Ok(())
    /// }
    /// ```
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search(&self, query: &str) -> Result<Vec<BibRecord>> {
        let parsed = parse_query(query)?;
        self.perform_search(&parsed).await
    }

    /// Transform, search, fetch and clean up
    ///
    /// Returns an empty list without touching the network when nothing in
    /// `query` is translatable.
    pub async fn perform_search(&self, query: &QueryNode) -> Result<Vec<BibRecord>> {
        Ok(self.perform_search_detailed(query).await?.records)
    }

    /// Like [`MedlineClient::perform_search`], also reporting the server's match count
    #[instrument(skip(self, query), fields(provider = self.provider.name))]
    pub async fn perform_search_detailed(&self, query: &QueryNode) -> Result<SearchOutcome> {
        let mut stage = PipelineStage::Idle;

        let Some(term) = self.transform(query) else {
            stage.advance(PipelineStage::Empty);
            debug!("Query has no translatable terms, skipping search");
            return Ok(SearchOutcome::default());
        };

        stage.advance(PipelineStage::Searching);
        let result = self.search_ids(&term).await?;

        if result.is_empty() {
            stage.advance(PipelineStage::Empty);
            info!("No results found.");
            return Ok(SearchOutcome {
                total_count: result.total_count,
                ..SearchOutcome::default()
            });
        }

        let cap = self.config.max_results;
        let truncated = result.total_count > cap;
        if truncated {
            info!(
                total_count = result.total_count,
                max_results = cap,
                "{} results found. Only {} relevant results will be fetched.",
                result.total_count,
                cap
            );
        }

        stage.advance(PipelineStage::Fetching);
        let ids: Vec<&str> = result.ids.iter().map(String::as_str).collect();
        let mut records = self.fetch_records(&ids).await?;
        for record in &mut records {
            self.cleanup(record);
        }

        stage.advance(PipelineStage::Done);
        info!(
            ids = ids.len(),
            records = records.len(),
            total_count = result.total_count,
            "Search completed"
        );

        Ok(SearchOutcome {
            records,
            total_count: result.total_count,
            truncated,
        })
    }

    /// Fetch and clean up a single record, skipping search
    ///
    /// ```no_run
    /// use medline_fetcher::MedlineClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = MedlineClient::new();
    ///     if let Some(record) = client.fetch_by_id("31978945").await? {
    ///         println!("{:?}", record.title());
    ///     }
    ///     Ok(())
    /// }
    /// ```
    #[instrument(skip(self), fields(id = %id))]
    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<BibRecord>> {
        let mut records = self.fetch_records(&[id]).await?;
        if records.is_empty() {
            debug!("No record returned for identifier");
            return Ok(None);
        }

        // prefer the record that carries the requested id
        let index = records
            .iter()
            .position(|record| record.pmid() == Some(id.trim()))
            .unwrap_or(0);

        let mut record = records.swap_remove(index);
        self.cleanup(&mut record);
        Ok(Some(record))
    }

    /// Send a GET request with API parameters, rate limiting and retries
    pub(crate) async fn make_request(&self, url: &str) -> Result<Response> {
        let mut final_url = url.to_string();
        let api_params = self.config.build_api_params();

        if !api_params.is_empty() {
            let separator = if url.contains('?') { '&' } else { '?' };
            final_url.push(separator);

            let param_strings: Vec<String> = api_params
                .into_iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(&value)))
                .collect();
            final_url.push_str(&param_strings.join("&"));
        }

        let response = with_retry(
            || async {
                self.rate_limiter.acquire().await;
                debug!("Making API request to: {}", final_url);
                let response = self
                    .client
                    .get(&final_url)
                    .send()
                    .await
                    .map_err(MedlineError::from)?;

                let status = response.status();
                if status.as_u16() == 429 {
                    return Err(MedlineError::RateLimitExceeded);
                }
                if status.is_server_error() {
                    return Err(MedlineError::ApiError {
                        status: status.as_u16(),
                        message: status
                            .canonical_reason()
                            .unwrap_or("Unknown error")
                            .to_string(),
                    });
                }

                Ok(response)
            },
            &self.config.retry_config,
            "E-utilities request",
        )
        .await?;

        if !response.status().is_success() {
            warn!("API request failed with status: {}", response.status());
            return Err(MedlineError::ApiError {
                status: response.status().as_u16(),
                message: response
                    .status()
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            });
        }

        Ok(response)
    }
}

impl Default for MedlineClient {
    fn default() -> Self {
        Self::new()
    }
}
