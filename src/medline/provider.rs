use super::cleanup::{CleanupRule, MEDLINE_CLEANUP};
use crate::query::{QuerySyntax, QueryTransformer};

/// Everything that differs between databases behind the E-utilities endpoints
///
/// A provider is plain data: the `db` parameter, how queries are written and
/// which cleanup runs on fetched records.
#[derive(Debug, Clone, Copy)]
pub struct Provider {
    /// Human readable name, used in log output
    pub name: &'static str,
    /// Value of the `db` request parameter
    pub database: &'static str,
    pub syntax: &'static QuerySyntax,
    pub cleanup_rules: &'static [CleanupRule],
}

impl Provider {
    /// PubMed with the Medline field-prefix syntax (`au:Smith`)
    pub const MEDLINE: Provider = Provider {
        name: "Medline/PubMed",
        database: "pubmed",
        syntax: &QuerySyntax::MEDLINE,
        cleanup_rules: MEDLINE_CLEANUP,
    };

    /// PubMed with Entrez field tags (`Smith[au]`)
    pub const PUBMED_ENTREZ: Provider = Provider {
        name: "PubMed (Entrez tags)",
        database: "pubmed",
        syntax: &QuerySyntax::ENTREZ,
        cleanup_rules: MEDLINE_CLEANUP,
    };

    pub fn transformer(&self) -> QueryTransformer {
        QueryTransformer::new(self.syntax)
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::MEDLINE
    }
}
