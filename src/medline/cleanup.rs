//! Post-fetch record cleanup
//!
//! Each provider carries a fixed, ordered list of [`CleanupRule`]s that is run
//! once over every fetched record. Every operation is idempotent.

use super::models::{BibRecord, Field, FieldValue};

/// Normalization applied to a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOp {
    /// Remove the field
    Clear,
    /// Rewrite month names and numbers to `jan` ... `dec`
    NormalizeMonth,
    /// Rewrite person names to `Last, First`
    NormalizeNames,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupRule {
    pub field: Field,
    pub op: CleanupOp,
}

impl CleanupRule {
    pub const fn new(field: Field, op: CleanupOp) -> Self {
        Self { field, op }
    }

    pub fn apply(&self, record: &mut BibRecord) {
        match self.op {
            CleanupOp::Clear => {
                record.remove(&self.field);
            }
            CleanupOp::NormalizeMonth => {
                let normalized = record
                    .get_text(&self.field)
                    .and_then(normalize_month)
                    .map(str::to_string);
                if let Some(month) = normalized {
                    record.set(self.field.clone(), month);
                }
            }
            CleanupOp::NormalizeNames => {
                let names: Option<Vec<String>> = match record.get(&self.field) {
                    Some(FieldValue::Names(names)) => {
                        Some(names.iter().map(|name| normalize_name(name)).collect())
                    }
                    Some(FieldValue::Text(text)) => Some(
                        text.split(" and ")
                            .map(normalize_name)
                            .filter(|name| !name.is_empty())
                            .collect(),
                    ),
                    _ => None,
                };
                if let Some(names) = names {
                    record.set(self.field.clone(), names);
                }
            }
        }
    }
}

/// Rules run on every Medline record, in this order
pub const MEDLINE_CLEANUP: &[CleanupRule] = &[
    CleanupRule::new(Field::JournalAbbreviation, CleanupOp::Clear),
    CleanupRule::new(Field::Status, CleanupOp::Clear),
    CleanupRule::new(Field::Copyright, CleanupOp::Clear),
    CleanupRule::new(Field::Month, CleanupOp::NormalizeMonth),
    CleanupRule::new(Field::Author, CleanupOp::NormalizeNames),
];

/// Apply `rules` to `record` in order
pub fn cleanup(record: &mut BibRecord, rules: &[CleanupRule]) {
    for rule in rules {
        rule.apply(record);
    }
}

const MONTHS: [(&str, &str); 12] = [
    ("jan", "january"),
    ("feb", "february"),
    ("mar", "march"),
    ("apr", "april"),
    ("may", "may"),
    ("jun", "june"),
    ("jul", "july"),
    ("aug", "august"),
    ("sep", "september"),
    ("oct", "october"),
    ("nov", "november"),
    ("dec", "december"),
];

/// Canonical three-letter month for `value`, or `None` when it is not a month
///
/// ```
/// use medline_fetcher::medline::cleanup::normalize_month;
///
/// assert_eq!(normalize_month("January"), Some("jan"));
/// assert_eq!(normalize_month("09"), Some("sep"));
/// assert_eq!(normalize_month("#oct#"), Some("oct"));
/// assert_eq!(normalize_month("Spring"), None);
/// ```
pub fn normalize_month(value: &str) -> Option<&'static str> {
    let cleaned = value
        .trim()
        .trim_matches('#')
        .trim_end_matches('.')
        .to_ascii_lowercase();

    if let Ok(number) = cleaned.parse::<usize>() {
        return (1..=12).contains(&number).then(|| MONTHS[number - 1].0);
    }

    let cleaned = if cleaned == "sept" { "sep".to_string() } else { cleaned };
    MONTHS
        .iter()
        .find(|(short, long)| cleaned == *short || cleaned == *long)
        .map(|(short, _)| *short)
}

/// Rewrite a person name to `Last, First` form
///
/// Handles `First Last`, `Last, First` and Medline's `Last FM` initials style.
/// Braced names (`{Study Group}`) are corporate and left alone.
///
/// ```
/// use medline_fetcher::medline::cleanup::normalize_name;
///
/// assert_eq!(normalize_name("John Smith"), "Smith, John");
/// assert_eq!(normalize_name("Smith JA"), "Smith, J. A.");
/// assert_eq!(normalize_name("Ludwig van Beethoven"), "van Beethoven, Ludwig");
/// assert_eq!(normalize_name("Smith, J. A."), "Smith, J. A.");
/// ```
pub fn normalize_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(',').trim();

    if trimmed.is_empty() || trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some((last, first)) = trimmed.split_once(',') {
        return join_name(last.trim(), &normalize_given_names(first));
    }

    let tokens: Vec<&str> = trimmed.split(' ').collect();
    if tokens.len() == 1 {
        return trimmed.to_string();
    }

    // Medline: "Smith JA"
    if tokens.len() == 2 && is_initials_block(tokens[1]) {
        return join_name(tokens[0], &normalize_given_names(tokens[1]));
    }

    // "First [Middle] [particles] Last"
    let mut split = tokens.len() - 1;
    while split > 1 && starts_lowercase(tokens[split - 1]) {
        split -= 1;
    }
    let last = tokens[split..].join(" ");
    let first = tokens[..split].join(" ");
    join_name(&last, &normalize_given_names(&first))
}

fn join_name(last: &str, first: &str) -> String {
    if first.is_empty() {
        last.to_string()
    } else {
        format!("{}, {}", last, first)
    }
}

fn starts_lowercase(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_lowercase)
}

/// `JA`, `J` or `JAK`: up to three capital letters without periods
fn is_initials_block(token: &str) -> bool {
    (1..=3).contains(&token.chars().count()) && token.chars().all(|c| c.is_ascii_uppercase())
}

fn normalize_given_names(given: &str) -> String {
    given
        .split_whitespace()
        .flat_map(|token| {
            if is_initials_block(token) {
                token.chars().map(|c| format!("{}.", c)).collect::<Vec<_>>()
            } else {
                vec![token.to_string()]
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
