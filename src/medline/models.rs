use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bibliographic field identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Pmid,
    Title,
    Author,
    Journal,
    JournalAbbreviation,
    Year,
    Month,
    /// Structured publication date
    Date,
    Volume,
    Number,
    Pages,
    Issn,
    Doi,
    Pmcid,
    Abstract,
    Keywords,
    Mesh,
    Language,
    PublicationType,
    Country,
    /// Medline indexing status (`MEDLINE`, `PubMed-not-MEDLINE`, ...)
    Status,
    Copyright,
    /// Any field without a dedicated variant
    Custom(String),
}

impl Field {
    pub fn as_str(&self) -> &str {
        match self {
            Field::Pmid => "pmid",
            Field::Title => "title",
            Field::Author => "author",
            Field::Journal => "journal",
            Field::JournalAbbreviation => "journal-abbreviation",
            Field::Year => "year",
            Field::Month => "month",
            Field::Date => "date",
            Field::Volume => "volume",
            Field::Number => "number",
            Field::Pages => "pages",
            Field::Issn => "issn",
            Field::Doi => "doi",
            Field::Pmcid => "pmcid",
            Field::Abstract => "abstract",
            Field::Keywords => "keywords",
            Field::Mesh => "mesh",
            Field::Language => "language",
            Field::PublicationType => "pubtype",
            Field::Country => "country",
            Field::Status => "status",
            Field::Copyright => "copyright",
            Field::Custom(name) => name,
        }
    }

    /// Look a field up by name, case-insensitively
    pub fn from_name(name: &str) -> Field {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "pmid" => Field::Pmid,
            "title" => Field::Title,
            "author" => Field::Author,
            "journal" => Field::Journal,
            "journal-abbreviation" => Field::JournalAbbreviation,
            "year" => Field::Year,
            "month" => Field::Month,
            "date" => Field::Date,
            "volume" => Field::Volume,
            "number" => Field::Number,
            "pages" => Field::Pages,
            "issn" => Field::Issn,
            "doi" => Field::Doi,
            "pmcid" => Field::Pmcid,
            "abstract" => Field::Abstract,
            "keywords" => Field::Keywords,
            "mesh" => Field::Mesh,
            "language" => Field::Language,
            "pubtype" => Field::PublicationType,
            "country" => Field::Country,
            "status" => Field::Status,
            "copyright" => Field::Copyright,
            _ => Field::Custom(lower),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Field::from_name(&name))
    }
}

/// Publication date with optional month and day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicationDate {
    pub year: u16,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl fmt::Display for PublicationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.month, self.day) {
            (Some(month), Some(day)) => write!(f, "{:04}-{:02}-{:02}", self.year, month, day),
            (Some(month), None) => write!(f, "{:04}-{:02}", self.year, month),
            _ => write!(f, "{:04}", self.year),
        }
    }
}

/// Value stored in a [`BibRecord`] field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Names(Vec<String>),
    Date(PublicationDate),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_names(&self) -> Option<&[String]> {
        match self {
            FieldValue::Names(names) => Some(names),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Names(names) => f.write_str(&names.join(" and ")),
            FieldValue::Date(date) => write!(f, "{}", date),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(names: Vec<String>) -> Self {
        FieldValue::Names(names)
    }
}

impl From<PublicationDate> for FieldValue {
    fn from(date: PublicationDate) -> Self {
        FieldValue::Date(date)
    }
}

/// A bibliographic record as produced by a record parser
///
/// Fields are kept in a stable order so records compare and print predictably.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibRecord {
    /// Entry type, e.g. `article`
    pub entry_type: String,
    fields: BTreeMap<Field, FieldValue>,
}

impl BibRecord {
    pub fn new<S: Into<String>>(entry_type: S) -> Self {
        Self {
            entry_type: entry_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field; empty text and empty name lists are not stored
    pub fn set<V: Into<FieldValue>>(&mut self, field: Field, value: V) {
        let value = value.into();
        let empty = match &value {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Names(names) => names.is_empty(),
            FieldValue::Date(_) => false,
        };
        if empty {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, value);
        }
    }

    pub fn with_field<V: Into<FieldValue>>(mut self, field: Field, value: V) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &Field) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_text(&self, field: &Field) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn get_names(&self, field: &Field) -> Option<&[String]> {
        self.get(field).and_then(FieldValue::as_names)
    }

    pub fn has_field(&self, field: &Field) -> bool {
        self.fields.contains_key(field)
    }

    pub fn remove(&mut self, field: &Field) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&Field, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn pmid(&self) -> Option<&str> {
        self.get_text(&Field::Pmid)
    }

    pub fn title(&self) -> Option<&str> {
        self.get_text(&Field::Title)
    }
}
