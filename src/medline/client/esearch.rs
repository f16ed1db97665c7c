//! Identifier search (ESearch)

use futures_util::StreamExt;
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

use super::MedlineClient;
use crate::error::Result;
use crate::medline::responses::{SearchResult, scan_search_stream};

impl MedlineClient {
    /// URL of the search request for `query`
    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}/esearch.fcgi?db={}&sort=relevance&retmax={}&term={}",
            self.base_url,
            self.provider.database,
            self.config.max_results,
            urlencoding::encode(query)
        )
    }

    /// Run a provider-syntax query against the search endpoint
    ///
    /// The response body is scanned while it streams in and dropped once the
    /// identifier list has been read.
    ///
    /// ```no_run
    /// use medline_fetcher::MedlineClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = MedlineClient::new();
    ///     let result = client.search_ids("au:Smith AND sd:2018 AND ed:2018").await?;
    ///     println!("{} of {} ids", result.ids.len(), result.total_count);
    ///     Ok(())
    /// }
    /// ```
    #[instrument(skip(self), fields(query = %query, database = self.provider.database))]
    pub async fn search_ids(&self, query: &str) -> Result<SearchResult> {
        if query.trim().is_empty() {
            debug!("Empty query provided, returning empty results");
            return Ok(SearchResult::default());
        }

        let url = self.search_url(query);
        debug!("Making ESearch API request");
        let response = self.make_request(&url).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let result = scan_search_stream(StreamReader::new(Box::pin(body))).await?;

        debug!(
            ids = result.ids.len(),
            total_count = result.total_count,
            "ESearch completed"
        );
        Ok(result)
    }
}
