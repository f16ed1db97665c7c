//! Medline EFetch XML parsing
//!
//! [`RecordParser`] is the seam between the fetch step and the record format.
//! [`MedlineXmlParser`] implements it for `PubmedArticleSet` documents.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, instrument};

use super::models::{BibRecord, Field, PublicationDate};
use crate::error::{MedlineError, Result};

/// Records parsed from one fetch response, plus non-fatal problems
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRecords {
    pub records: Vec<BibRecord>,
    pub warnings: Vec<String>,
}

impl ParsedRecords {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// All warnings on one line
    pub fn warning_message(&self) -> String {
        self.warnings.join("; ")
    }
}

/// Parses a fetch response body into records
///
/// Fatal problems (unreadable documents) are errors; anything that only
/// affects individual records belongs in [`ParsedRecords::warnings`].
pub trait RecordParser: Send + Sync {
    fn parse(&self, document: &str) -> Result<ParsedRecords>;
}

/// Parser for Medline `PubmedArticleSet` XML
#[derive(Debug, Clone, Copy, Default)]
pub struct MedlineXmlParser;

impl RecordParser for MedlineXmlParser {
    #[instrument(skip(self, document), fields(xml_size = document.len()))]
    fn parse(&self, document: &str) -> Result<ParsedRecords> {
        let mut reader = Reader::from_str(document);
        let mut state = ParseState::default();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => state.start(e)?,
                Ok(Event::Empty(ref e)) => {
                    state.start(e)?;
                    state.end(e.local_name().as_ref());
                }
                Ok(Event::Text(ref e)) => {
                    if state.capturing {
                        state.text.push_str(&e.unescape()?);
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if state.capturing {
                        state.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Ok(Event::End(ref e)) => state.end(e.local_name().as_ref()),
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    // keep what was complete before the damage
                    if state.parsed.records.is_empty() {
                        return Err(MedlineError::XmlError(format!(
                            "Failed to parse Medline XML at position {}: {}",
                            reader.buffer_position(),
                            err
                        )));
                    }
                    state.parsed.warnings.push(format!(
                        "Medline XML is damaged after {} records: {}",
                        state.parsed.records.len(),
                        err
                    ));
                    break;
                }
            }
        }

        debug!(
            records = state.parsed.records.len(),
            warnings = state.parsed.warnings.len(),
            "Parsed Medline document"
        );
        Ok(state.parsed)
    }
}

/// Elements whose text content is collected
const CAPTURED: &[&[u8]] = &[
    b"PMID",
    b"ArticleTitle",
    b"AbstractText",
    b"CopyrightInformation",
    b"Title",
    b"ISOAbbreviation",
    b"MedlineTA",
    b"Volume",
    b"Issue",
    b"MedlinePgn",
    b"ISSN",
    b"Year",
    b"Month",
    b"Day",
    b"MedlineDate",
    b"LastName",
    b"ForeName",
    b"Initials",
    b"CollectiveName",
    b"Keyword",
    b"DescriptorName",
    b"Language",
    b"PublicationType",
    b"Country",
    b"ArticleId",
    b"ELocationID",
    b"ERROR",
];

#[derive(Default)]
struct ParseState {
    parsed: ParsedRecords,
    path: Vec<String>,
    article: Option<ArticleBuilder>,
    capturing: bool,
    text: String,
    /// IdType / EIdType / Label of the element being captured
    attribute: Option<String>,
}

impl ParseState {
    fn inside(&self, name: &str) -> bool {
        self.path.iter().any(|p| p == name)
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

        match name.as_str() {
            "PubmedArticle" => self.article = Some(ArticleBuilder::default()),
            "PubmedBookArticle" => self
                .parsed
                .warnings
                .push("Skipping book article, only journal articles are supported".to_string()),
            "MedlineCitation" => {
                if let (Some(article), Some(status)) =
                    (self.article.as_mut(), attribute(e, b"Status")?)
                {
                    article.status = Some(status);
                }
            }
            "Author" => {
                if let Some(article) = self.article.as_mut() {
                    article.author = AuthorParts::default();
                }
            }
            _ => {}
        }

        if CAPTURED.contains(&name.as_bytes()) {
            self.capturing = true;
            self.text.clear();
            self.attribute = match name.as_str() {
                "ArticleId" => attribute(e, b"IdType")?,
                "ELocationID" => attribute(e, b"EIdType")?,
                "AbstractText" => attribute(e, b"Label")?,
                _ => None,
            };
        }

        self.path.push(name);
        Ok(())
    }

    fn end(&mut self, name: &[u8]) {
        if CAPTURED.contains(&name) && self.capturing {
            self.capturing = false;
            let text = collapse_whitespace(&self.text);
            let attribute = self.attribute.take();
            self.captured(name, text, attribute);
        }

        match name {
            b"Author" => {
                if let Some(article) = self.article.as_mut() {
                    let author = std::mem::take(&mut article.author);
                    if let Some(full_name) = author.full_name() {
                        article.authors.push(full_name);
                    }
                }
            }
            b"PubmedArticle" => {
                if let Some(article) = self.article.take() {
                    match article.build() {
                        Ok(record) => self.parsed.records.push(record),
                        Err(warning) => self.parsed.warnings.push(warning),
                    }
                }
            }
            _ => {}
        }

        self.path.pop();
    }

    fn captured(&mut self, name: &[u8], text: String, attribute: Option<String>) {
        if name == b"ERROR" {
            self.parsed
                .warnings
                .push(format!("Server reported an error: {}", text));
            return;
        }
        if text.is_empty() {
            return;
        }

        let in_pub_date = self.inside("PubDate");
        let in_journal = self.inside("Journal");
        let in_references = self.inside("CommentsCorrections") || self.inside("ReferenceList");
        let in_article_ids = self.inside("ArticleIdList") && !in_references;

        let Some(article) = self.article.as_mut() else {
            return;
        };

        match name {
            b"PMID" if !in_references && article.pmid.is_none() => article.pmid = Some(text),
            b"ArticleTitle" => article.title = Some(text),
            b"AbstractText" => article.abstract_parts.push(match attribute {
                Some(label) if !label.is_empty() => format!("{}: {}", label, text),
                _ => text,
            }),
            b"CopyrightInformation" => article.copyright = Some(text),
            b"Title" if in_journal => article.journal = Some(text),
            b"ISOAbbreviation" => article.journal_abbreviation = Some(text),
            b"MedlineTA" if article.journal_abbreviation.is_none() => {
                article.journal_abbreviation = Some(text)
            }
            b"Volume" if in_journal => article.volume = Some(text),
            b"Issue" if in_journal => article.issue = Some(text),
            b"MedlinePgn" => article.pages = Some(text),
            b"ISSN" if in_journal => article.issn = Some(text),
            b"Year" if in_pub_date => article.year = Some(text),
            b"Month" if in_pub_date => article.month = Some(text),
            b"Day" if in_pub_date => article.day = Some(text),
            b"MedlineDate" if in_pub_date => article.medline_date = Some(text),
            b"LastName" => article.author.last = Some(text),
            b"ForeName" => article.author.fore = Some(text),
            b"Initials" => article.author.initials = Some(text),
            b"CollectiveName" => article.author.collective = Some(text),
            b"Keyword" => article.keywords.push(text),
            b"DescriptorName" => article.mesh.push(text),
            b"Language" => article.language = Some(text),
            b"PublicationType" => article.publication_types.push(text),
            b"Country" => article.country = Some(text),
            b"ArticleId" if in_article_ids => match attribute.as_deref() {
                Some("doi") => article.doi = Some(text),
                Some("pmc") => article.pmcid = Some(text),
                _ => {}
            },
            b"ELocationID" if attribute.as_deref() == Some("doi") && article.doi.is_none() => {
                article.doi = Some(text)
            }
            _ => {}
        }
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| MedlineError::XmlError(err.to_string()))?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Default)]
struct AuthorParts {
    last: Option<String>,
    fore: Option<String>,
    initials: Option<String>,
    collective: Option<String>,
}

impl AuthorParts {
    fn full_name(self) -> Option<String> {
        if let Some(collective) = self.collective {
            return Some(format!("{{{}}}", collective));
        }
        let last = self.last?;
        let given = self.fore.or_else(|| {
            self.initials.map(|initials| {
                initials
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .map(|c| format!("{}.", c))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
        });
        Some(match given {
            Some(given) if !given.is_empty() => format!("{}, {}", last, given),
            _ => last,
        })
    }
}

#[derive(Default)]
struct ArticleBuilder {
    pmid: Option<String>,
    status: Option<String>,
    title: Option<String>,
    abstract_parts: Vec<String>,
    copyright: Option<String>,
    journal: Option<String>,
    journal_abbreviation: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    pages: Option<String>,
    issn: Option<String>,
    year: Option<String>,
    month: Option<String>,
    day: Option<String>,
    medline_date: Option<String>,
    author: AuthorParts,
    authors: Vec<String>,
    keywords: Vec<String>,
    mesh: Vec<String>,
    language: Option<String>,
    publication_types: Vec<String>,
    country: Option<String>,
    doi: Option<String>,
    pmcid: Option<String>,
}

impl ArticleBuilder {
    /// Finished record, or a warning explaining why the article was skipped
    fn build(self) -> std::result::Result<BibRecord, String> {
        let pmid = self
            .pmid
            .ok_or_else(|| "Skipping article without PMID".to_string())?;

        let (year, month) = match (self.year, self.medline_date) {
            (Some(year), _) => (Some(year), self.month),
            // "2019 Jan-Feb", "1998 Dec-1999 Jan"
            (None, Some(medline_date)) => {
                let mut parts = medline_date.split_whitespace();
                let year = parts
                    .next()
                    .filter(|y| y.len() == 4 && y.chars().all(|c| c.is_ascii_digit()))
                    .map(str::to_string);
                let month = parts
                    .next()
                    .and_then(|m| m.split('-').next())
                    .map(str::to_string);
                (year, self.month.or(month))
            }
            (None, None) => (None, self.month),
        };

        let mut record = BibRecord::new("article");
        record.set(Field::Pmid, pmid);
        if let Some(title) = self.title {
            record.set(Field::Title, title);
        }
        record.set(Field::Author, self.authors);
        for (field, value) in [
            (Field::Journal, self.journal),
            (Field::JournalAbbreviation, self.journal_abbreviation),
            (Field::Volume, self.volume),
            (Field::Number, self.issue),
            (Field::Pages, self.pages),
            (Field::Issn, self.issn),
            (Field::Doi, self.doi),
            (Field::Pmcid, self.pmcid),
            (Field::Language, self.language),
            (Field::Country, self.country),
            (Field::Status, self.status),
            (Field::Copyright, self.copyright),
        ] {
            if let Some(value) = value {
                record.set(field, value);
            }
        }

        if let Some(date) = publication_date(year.as_deref(), month.as_deref(), self.day.as_deref())
        {
            record.set(Field::Date, date);
        }
        if let Some(year) = year {
            record.set(Field::Year, year);
        }
        if let Some(month) = month {
            record.set(Field::Month, month);
        }

        record.set(Field::Abstract, self.abstract_parts.join(" "));
        record.set(Field::Keywords, self.keywords.join(", "));
        record.set(Field::Mesh, self.mesh.join(", "));
        record.set(Field::PublicationType, self.publication_types.join(", "));

        Ok(record)
    }
}

fn publication_date(
    year: Option<&str>,
    month: Option<&str>,
    day: Option<&str>,
) -> Option<PublicationDate> {
    let year = year?.parse::<u16>().ok()?;
    let month = month.and_then(month_number);
    let day = month
        .and(day)
        .and_then(|d| d.parse::<u8>().ok())
        .filter(|d| (1..=31).contains(d));
    Some(PublicationDate { year, month, day })
}

fn month_number(month: &str) -> Option<u8> {
    super::cleanup::normalize_month(month).and_then(|short| {
        const ORDER: [&str; 12] = [
            "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
        ];
        ORDER
            .iter()
            .position(|m| *m == short)
            .map(|index| index as u8 + 1)
    })
}
