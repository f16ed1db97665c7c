//! Rendering query trees into provider search syntax
//!
//! Everything provider-specific lives in a [`QuerySyntax`] value: field tags,
//! how years are expressed and the operator spelling. The walk itself is shared.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::{QueryNode, YEAR_FIELD, YEAR_RANGE_FIELD};

/// How a field is attached to a term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    /// `au:Smith`; an empty prefix searches all fields
    Prefix(&'static str),
    /// `Smith[au]`
    Suffix(&'static str),
}

impl FieldTag {
    fn apply(&self, value: &str) -> String {
        let value = quote_if_needed(value);
        match self {
            FieldTag::Prefix(prefix) => format!("{}{}", prefix, value),
            FieldTag::Suffix(suffix) => format!("{}{}", value, suffix),
        }
    }
}

/// Treatment of fields missing from [`QuerySyntax::fields`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherFields {
    /// `field:value`
    Prefixed,
    /// `value[field]`
    Suffixed,
    /// Not translatable
    Dropped,
}

/// How publication years are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearSyntax {
    /// Start-date and end-date constraints joined with AND: `sd:2018 AND ed:2021`
    Bounds { start: FieldTag, end: FieldTag },
    /// One tagged span: `2018:2021[dp]`
    Span {
        tag: FieldTag,
        separator: &'static str,
        open_start: &'static str,
        open_end: &'static str,
    },
}

/// Provider query language, as data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySyntax {
    /// Known field names (lowercase) and their tags
    pub fields: &'static [(&'static str, FieldTag)],
    /// Tag for bare terms
    pub unfielded: FieldTag,
    pub other_fields: OtherFields,
    pub year: YearSyntax,
    pub and: &'static str,
    pub or: &'static str,
    pub not: &'static str,
}

impl QuerySyntax {
    /// Prefix syntax used by the Medline provider: `au:Smith AND sd:2018 AND ed:2018`
    pub const MEDLINE: QuerySyntax = QuerySyntax {
        fields: &[
            ("author", FieldTag::Prefix("au:")),
            ("title", FieldTag::Prefix("ti:")),
            ("journal", FieldTag::Prefix("pt:")),
            ("doi", FieldTag::Prefix("doi:")),
        ],
        unfielded: FieldTag::Prefix(""),
        other_fields: OtherFields::Prefixed,
        year: YearSyntax::Bounds {
            start: FieldTag::Prefix("sd:"),
            end: FieldTag::Prefix("ed:"),
        },
        and: " AND ",
        or: " OR ",
        not: "NOT ",
    };

    /// Entrez search-field tags: `Smith[au] AND 2018:2021[dp]`
    pub const ENTREZ: QuerySyntax = QuerySyntax {
        fields: &[
            ("author", FieldTag::Suffix("[au]")),
            ("title", FieldTag::Suffix("[ti]")),
            ("journal", FieldTag::Suffix("[ta]")),
            ("doi", FieldTag::Suffix("[aid]")),
            ("abstract", FieldTag::Suffix("[tiab]")),
            ("mesh", FieldTag::Suffix("[mh]")),
        ],
        unfielded: FieldTag::Prefix(""),
        other_fields: OtherFields::Suffixed,
        year: YearSyntax::Span {
            tag: FieldTag::Suffix("[dp]"),
            separator: ":",
            open_start: "1800",
            open_end: "3000",
        },
        and: " AND ",
        or: " OR ",
        not: "NOT ",
    };

    fn tag_for(&self, field: &str) -> Option<FieldTag> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, tag)| *tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    And,
    Or,
}

/// Rendered sub-expression; `combinator` is set when it joins several parts
struct Rendered {
    text: String,
    combinator: Option<Combinator>,
}

impl Rendered {
    fn atom(text: String) -> Self {
        Self {
            text,
            combinator: None,
        }
    }
}

/// Translates [`QueryNode`] trees into one provider's syntax
///
/// ```
/// use medline_fetcher::query::{QueryNode, QuerySyntax, QueryTransformer};
///
/// let transformer = QueryTransformer::new(&QuerySyntax::MEDLINE);
/// let query = QueryNode::field("year", "2018");
/// assert_eq!(transformer.transform(&query).as_deref(), Some("sd:2018 AND ed:2018"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct QueryTransformer {
    syntax: &'static QuerySyntax,
}

impl QueryTransformer {
    pub fn new(syntax: &'static QuerySyntax) -> Self {
        Self { syntax }
    }

    pub fn syntax(&self) -> &'static QuerySyntax {
        self.syntax
    }

    /// Render `query`, or `None` when nothing in it is translatable
    pub fn transform(&self, query: &QueryNode) -> Option<String> {
        self.render(query)
            .map(|rendered| rendered.text)
            .filter(|text| !text.trim().is_empty())
    }

    fn render(&self, node: &QueryNode) -> Option<Rendered> {
        match node {
            QueryNode::And(children) => self.render_boolean(children, Combinator::And),
            QueryNode::Or(children) => self.render_boolean(children, Combinator::Or),
            QueryNode::Not(child) => {
                let inner = self.render(child)?;
                Some(Rendered::atom(format!(
                    "{}{}",
                    self.syntax.not,
                    self.grouped(inner, None)
                )))
            }
            QueryNode::Unfielded(term) => {
                let term = term.trim();
                (!term.is_empty()).then(|| Rendered::atom(self.syntax.unfielded.apply(term)))
            }
            QueryNode::Field { field, value } => self.render_field(field, value.trim()),
            QueryNode::Range {
                field,
                lower,
                upper,
            } => {
                if is_year_field(field) {
                    self.render_years(lower.as_deref(), upper.as_deref())
                } else {
                    debug!(field = %field, "Range terms are only translatable on years");
                    None
                }
            }
        }
    }

    fn render_boolean(&self, children: &[QueryNode], combinator: Combinator) -> Option<Rendered> {
        let mut parts: Vec<Rendered> = children
            .iter()
            .filter_map(|child| self.render(child))
            .collect();

        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => {
                let delimiter = match combinator {
                    Combinator::And => self.syntax.and,
                    Combinator::Or => self.syntax.or,
                };
                let text = parts
                    .into_iter()
                    .map(|part| self.grouped(part, Some(combinator)))
                    .collect::<Vec<_>>()
                    .join(delimiter);
                Some(Rendered {
                    text,
                    combinator: Some(combinator),
                })
            }
        }
    }

    /// Parenthesize `part` unless it is atomic or joins with the parent's operator
    fn grouped(&self, part: Rendered, parent: Option<Combinator>) -> String {
        match part.combinator {
            Some(inner) if Some(inner) != parent => format!("({})", part.text),
            _ => part.text,
        }
    }

    fn render_field(&self, field: &str, value: &str) -> Option<Rendered> {
        if value.is_empty() {
            return None;
        }

        if field.eq_ignore_ascii_case(YEAR_FIELD) {
            return match year(value) {
                Some(y) => self.render_years(Some(y), Some(y)),
                None => {
                    debug!(value = %value, "Ignoring year term that is not a year");
                    None
                }
            };
        }

        if field.eq_ignore_ascii_case(YEAR_RANGE_FIELD) {
            return match year_range(value) {
                Some((start, end)) => self.render_years(start, end),
                None => {
                    debug!(value = %value, "Ignoring malformed year range");
                    None
                }
            };
        }

        if let Some(tag) = self.syntax.tag_for(field) {
            return Some(Rendered::atom(tag.apply(value)));
        }

        let value = quote_if_needed(value);
        match self.syntax.other_fields {
            OtherFields::Prefixed => Some(Rendered::atom(format!("{}:{}", field, value))),
            OtherFields::Suffixed => Some(Rendered::atom(format!("{}[{}]", value, field))),
            OtherFields::Dropped => None,
        }
    }

    fn render_years(&self, start: Option<&str>, end: Option<&str>) -> Option<Rendered> {
        let start = start.and_then(year);
        let end = end.and_then(year);

        match self.syntax.year {
            YearSyntax::Bounds {
                start: start_tag,
                end: end_tag,
            } => {
                let parts: Vec<String> = [
                    start.map(|y| start_tag.apply(y)),
                    end.map(|y| end_tag.apply(y)),
                ]
                .into_iter()
                .flatten()
                .collect();
                match parts.len() {
                    0 => None,
                    1 => parts.into_iter().next().map(Rendered::atom),
                    _ => Some(Rendered {
                        text: parts.join(self.syntax.and),
                        combinator: Some(Combinator::And),
                    }),
                }
            }
            YearSyntax::Span {
                tag,
                separator,
                open_start,
                open_end,
            } => match (start, end) {
                (None, None) => None,
                (Some(s), Some(e)) if s == e => Some(Rendered::atom(tag.apply(s))),
                (s, e) => Some(Rendered::atom(tag.apply(&format!(
                    "{}{}{}",
                    s.unwrap_or(open_start),
                    separator,
                    e.unwrap_or(open_end)
                )))),
            },
        }
    }
}

fn is_year_field(field: &str) -> bool {
    field.eq_ignore_ascii_case(YEAR_FIELD) || field.eq_ignore_ascii_case(YEAR_RANGE_FIELD)
}

fn quote_if_needed(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

fn year(value: &str) -> Option<&str> {
    static YEAR_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = YEAR_REGEX.get_or_init(|| Regex::new(r"^\d{4}$").expect("valid year regex"));
    let value = value.trim();
    re.is_match(value).then_some(value)
}

/// Split `2018-2021`, `2018-` or `-2021`
fn year_range(value: &str) -> Option<(Option<&str>, Option<&str>)> {
    static RANGE_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = RANGE_REGEX
        .get_or_init(|| Regex::new(r"^(\d{4})?-(\d{4})?$").expect("valid year range regex"));

    let captures = re.captures(value.trim())?;
    let start = captures.get(1).map(|m| m.as_str());
    let end = captures.get(2).map(|m| m.as_str());
    if start.is_none() && end.is_none() {
        return None;
    }
    Some((start, end))
}
