//! Batch record fetch (EFetch)

use tracing::{debug, info, instrument, warn};

use super::MedlineClient;
use crate::error::{MedlineError, Result};
use crate::medline::models::BibRecord;

impl MedlineClient {
    /// URL that retrieves the record for `id`
    pub fn fetch_url(&self, id: &str) -> String {
        self.batch_url(&[id.trim()])
    }

    fn batch_url(&self, ids: &[&str]) -> String {
        let id_list = ids
            .iter()
            .map(|id| urlencoding::encode(id))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/efetch.fcgi?db={}&retmode=xml&id={}",
            self.base_url, self.provider.database, id_list
        )
    }

    /// Fetch full records for `ids` in a single request
    ///
    /// Records come back as the parser produced them; provider cleanup is not
    /// applied here. Parser warnings are logged and do not fail the fetch.
    ///
    /// ```no_run
    /// use medline_fetcher::MedlineClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = MedlineClient::new();
    ///     let records = client.fetch_records(&["31978945", "33515491"]).await?;
    ///     for record in &records {
    ///         println!("{:?}: {:?}", record.pmid(), record.title());
    ///     }
    ///     Ok(())
    /// }
    /// ```
    #[instrument(skip(self), fields(ids_count = ids.len()))]
    pub async fn fetch_records(&self, ids: &[&str]) -> Result<Vec<BibRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let validated = ids
            .iter()
            .copied()
            .map(validate_id)
            .collect::<Result<Vec<_>>>()?;

        let url = self.batch_url(&validated);
        debug!(batch_size = validated.len(), "Making batch EFetch API request");
        let response = self.make_request(&url).await?;
        let xml_text = response.text().await?;

        if xml_text.trim().is_empty() {
            debug!("Empty EFetch response");
            return Ok(Vec::new());
        }

        let parsed = self.parser.parse(&xml_text)?;
        for warning in &parsed.warnings {
            warn!(provider = self.provider.name, "{}", warning);
        }

        info!(
            requested = validated.len(),
            parsed = parsed.records.len(),
            "Batch fetch completed"
        );
        Ok(parsed.records)
    }
}

/// Identifiers are joined with `,` on the wire, so they cannot contain one
fn validate_id(id: &str) -> Result<&str> {
    let trimmed = id.trim();
    if trimmed.is_empty() || trimmed.contains(',') {
        return Err(MedlineError::InvalidIdentifier { id: id.to_string() });
    }
    Ok(trimmed)
}
