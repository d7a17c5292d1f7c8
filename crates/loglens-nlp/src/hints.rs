//! Lexical hint extraction.
//!
//! Pulls structured signals out of a raw question with pre-compiled regular
//! expressions: addresses, status codes, time phrases, paths, quoted literals,
//! table names and the operator style the user seems to want. Extraction is
//! total and deterministic; nothing here can fail.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use tracing::trace;

use crate::catalog::COMMON_TABLES;

lazy_static! {
    // Octets are not bounded to 0-255.
    static ref IPV4: Regex = Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap();
    static ref EMAIL: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref STATUS_CODE: Regex = Regex::new(r"\b[1-5]\d{2}\b").unwrap();
    static ref RELATIVE_TIME: Regex = Regex::new(
        r"(?i)\b(\d+)\s*(minutes|minute|mins|min|hours|hour|hrs|hr|h|days|day|d|weeks|week|w)\b"
    )
    .unwrap();
    static ref URL_PATH: Regex =
        Regex::new(r"(?:^|[\s(])(/[A-Za-z0-9_\-.]+(?:/[A-Za-z0-9_\-.]+)*/?)").unwrap();
    static ref DOUBLE_QUOTED: Regex = Regex::new(r#""([^"]+)""#).unwrap();
    static ref SINGLE_QUOTED: Regex = Regex::new(r"(?:^|[\s(=:,])'([^']+)'").unwrap();
    static ref COMPARISON: Regex = Regex::new(
        r"(?i)(>|<|\bbetween\b|\bgreater than\b|\bless than\b|\bmore than\b|\bfewer than\b|\bat least\b|\bat most\b|\babove\b|\bbelow\b|\bexceed)"
    )
    .unwrap();
    static ref STRING_MATCH: Regex = Regex::new(
        r"(?i)\b(contains?|containing|starts? with|startswith|ends? with|endswith|not|doesn't|does not|excluding|except|without)\b"
    )
    .unwrap();
    static ref COUNT: Regex = Regex::new(r"(?i)\b(count|how many|number of)\b").unwrap();
    static ref AVERAGE: Regex = Regex::new(r"(?i)\b(avg|average|mean)\b").unwrap();
    static ref SUM: Regex = Regex::new(r"(?i)\b(sum|total)\b").unwrap();
    static ref TOP_N: Regex = Regex::new(r"(?i)\btop\s+(\d+)\b").unwrap();
    // "top 100", "last 200 requests", "250 syslog lines": row counts, not status codes.
    static ref ROW_COUNT: Regex = Regex::new(
        r"(?i)\b(?:top|bottom|least|first|last|latest|newest|recent)\s+\d+\b|\b\d+\s+(?:[a-z_]+\s+)?(?:rows?|lines?|results?|entries|entry|records?|events?|items?)\b"
    )
    .unwrap();
    static ref BOTTOM_N: Regex = Regex::new(r"(?i)\b(?:bottom|least)\s+(\d+)\b").unwrap();
    static ref GROUP_BY: Regex =
        Regex::new(r"(?i)\b(group(ed)? by|per|breakdown|broken down by|by each)\b").unwrap();
    static ref WORD: Regex = Regex::new(r"[A-Za-z0-9_]+").unwrap();
}

/// Unit of a relative time phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Week,
}

/// A `<number> <unit>` phrase such as "5 minutes" or "24h".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativeTime {
    pub amount: u32,
    pub unit: TimeUnit,
}

impl RelativeTime {
    /// The KQL timespan literal, weeks expressed in days.
    pub fn to_kql(&self) -> String {
        match self.unit {
            TimeUnit::Minute => format!("{}m", self.amount),
            TimeUnit::Hour => format!("{}h", self.amount),
            TimeUnit::Day => format!("{}d", self.amount),
            TimeUnit::Week => format!("{}d", self.amount.saturating_mul(7)),
        }
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
        };
        let plural = if self.amount == 1 { "" } else { "s" };
        write!(f, "{} {}{}", self.amount, unit, plural)
    }
}

/// Aggregation style the question asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    Count,
    Average,
    Sum,
    Top(u32),
    Bottom(u32),
    GroupBy,
}

impl Aggregation {
    fn describe(&self) -> String {
        match self {
            Self::Count => "User wants count aggregation".to_string(),
            Self::Average => "User wants average aggregation".to_string(),
            Self::Sum => "User wants sum aggregation".to_string(),
            Self::Top(n) => format!("User wants the top {} results", n),
            Self::Bottom(n) => format!("User wants the bottom {} results", n),
            Self::GroupBy => "User wants results grouped by a column".to_string(),
        }
    }
}

/// Signals extracted from one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalHints {
    pub ip_addresses: Vec<String>,
    pub emails: Vec<String>,
    pub status_codes: Vec<u16>,
    pub time_ranges: Vec<RelativeTime>,
    pub url_paths: Vec<String>,
    pub quoted: Vec<String>,
    pub tables: Vec<String>,
    pub comparison: bool,
    pub string_match: bool,
    pub aggregations: Vec<Aggregation>,
}

impl LexicalHints {
    /// Extracts every hint category from `text`.
    pub fn extract(text: &str) -> Self {
        trace!("Extracting lexical hints");

        let ip_addresses = unique(IPV4.find_iter(text).map(|m| m.as_str().to_string()));
        let emails = unique(EMAIL.find_iter(text).map(|m| m.as_str().to_string()));

        let time_ranges = unique(RELATIVE_TIME.captures_iter(text).filter_map(|c| {
            let amount = c.get(1)?.as_str().parse::<u32>().ok()?;
            let unit = parse_unit(c.get(2)?.as_str())?;
            Some(RelativeTime { amount, unit })
        }));

        // Digits inside addresses, time phrases and row counts are not status codes.
        let scrubbed = IPV4.replace_all(text, " ");
        let scrubbed = RELATIVE_TIME.replace_all(&scrubbed, " ");
        let scrubbed = ROW_COUNT.replace_all(&scrubbed, " ").into_owned();
        let status_codes = unique(
            STATUS_CODE
                .find_iter(&scrubbed)
                .filter_map(|m| m.as_str().parse::<u16>().ok())
                .filter(|code| (100..=599).contains(code)),
        );

        let url_paths = unique(
            URL_PATH
                .captures_iter(text)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .filter(|p| p.len() > 1),
        );

        let quoted = unique(
            DOUBLE_QUOTED
                .captures_iter(text)
                .chain(SINGLE_QUOTED.captures_iter(text))
                .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
                .filter(|q| !q.is_empty()),
        );

        let mut aggregations = Vec::new();
        if COUNT.is_match(text) {
            aggregations.push(Aggregation::Count);
        }
        if AVERAGE.is_match(text) {
            aggregations.push(Aggregation::Average);
        }
        if SUM.is_match(text) {
            aggregations.push(Aggregation::Sum);
        }
        if let Some(n) = first_number(&TOP_N, text) {
            aggregations.push(Aggregation::Top(n));
        }
        if let Some(n) = first_number(&BOTTOM_N, text) {
            aggregations.push(Aggregation::Bottom(n));
        }
        if GROUP_BY.is_match(text) {
            aggregations.push(Aggregation::GroupBy);
        }

        Self {
            ip_addresses,
            emails,
            status_codes,
            time_ranges,
            url_paths,
            quoted,
            tables: explicit_tables(text, &[]),
            comparison: COMPARISON.is_match(text),
            string_match: STRING_MATCH.is_match(text),
            aggregations,
        }
    }

    /// True when no category produced anything.
    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }

    /// Human-readable hint lines in a fixed category order.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if !self.ip_addresses.is_empty() {
            lines.push(format!("IP address(es) found: {}", self.ip_addresses.join(", ")));
        }
        if !self.emails.is_empty() {
            lines.push(format!("Email address(es) found: {}", self.emails.join(", ")));
        }
        if !self.status_codes.is_empty() {
            let codes: Vec<String> = self.status_codes.iter().map(u16::to_string).collect();
            lines.push(format!("HTTP status code(s) mentioned: {}", codes.join(", ")));
        }
        if !self.time_ranges.is_empty() {
            let ranges: Vec<String> = self
                .time_ranges
                .iter()
                .map(|t| format!("{} (ago({}))", t, t.to_kql()))
                .collect();
            lines.push(format!("Time range mentioned: {}", ranges.join(", ")));
        }
        if !self.url_paths.is_empty() {
            lines.push(format!("URL path(s) found: {}", self.url_paths.join(", ")));
        }
        if !self.quoted.is_empty() {
            let quoted: Vec<String> = self.quoted.iter().map(|q| format!("\"{}\"", q)).collect();
            lines.push(format!("Quoted value(s) to match exactly: {}", quoted.join(", ")));
        }
        if !self.tables.is_empty() {
            lines.push(format!("Table name(s) mentioned: {}", self.tables.join(", ")));
        }
        if self.comparison {
            lines.push("User wants comparison filtering (>, <, between)".to_string());
        }
        if self.string_match {
            lines.push(
                "User wants string matching (contains, startswith, endswith or negation)"
                    .to_string(),
            );
        }
        lines.extend(self.aggregations.iter().map(Aggregation::describe));

        lines
    }
}

/// Table names written literally in `text`.
///
/// Built-in table names match case-sensitively, or case-insensitively when
/// the name is distinctive enough (camel-cased or suffixed) not to collide
/// with plain English words like "usage" or "event". Workspace tables in
/// `extra` always match case-insensitively.
pub fn explicit_tables(text: &str, extra: &[String]) -> Vec<String> {
    let words: Vec<&str> = WORD.find_iter(text).map(|m| m.as_str()).collect();

    let builtin = COMMON_TABLES.iter().map(|t| (t.to_string(), is_distinctive(t)));
    let workspace = extra.iter().map(|t| (t.clone(), true));

    unique(builtin.chain(workspace).filter_map(|(table, loose)| {
        let found = words.iter().any(|w| {
            if loose {
                w.eq_ignore_ascii_case(&table)
            } else {
                *w == table
            }
        });
        found.then_some(table)
    }))
}

fn is_distinctive(table: &str) -> bool {
    table.contains('_') || table.chars().filter(|c| c.is_ascii_uppercase()).count() >= 2
}

fn parse_unit(unit: &str) -> Option<TimeUnit> {
    match unit.to_ascii_lowercase().as_str() {
        "minutes" | "minute" | "mins" | "min" => Some(TimeUnit::Minute),
        "hours" | "hour" | "hrs" | "hr" | "h" => Some(TimeUnit::Hour),
        "days" | "day" | "d" => Some(TimeUnit::Day),
        "weeks" | "week" | "w" => Some(TimeUnit::Week),
        _ => None,
    }
}

fn first_number(regex: &Regex, text: &str) -> Option<u32> {
    regex
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn unique<T: Eq + Hash + Clone>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}
