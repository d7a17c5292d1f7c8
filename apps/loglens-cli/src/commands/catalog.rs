//! Catalog listing command

use anyhow::Result;
use colored::Colorize;
use loglens_nlp::{CatalogEntry, ENTRIES};
use tabled::{Table, Tabled};

use crate::output::{self, OutputFormat};

const QUERY_WIDTH: usize = 70;

pub fn run(filter: Option<&str>, format: OutputFormat) -> Result<()> {
    let entries = matching(filter);

    if let Some(text) = output::structured(&entries, format)? {
        println!("{}", text);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "No catalog entries match.".dimmed());
        return Ok(());
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "Phrase")]
        phrase: &'static str,
        #[tabled(rename = "Query")]
        query: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            phrase: e.phrase,
            query: output::truncate(e.query, QUERY_WIDTH),
        })
        .collect();

    println!("{}", Table::new(rows));
    output::dimmed(&format!("{} of {} entries", entries.len(), ENTRIES.len()));

    Ok(())
}

fn matching(filter: Option<&str>) -> Vec<CatalogEntry> {
    let needle = filter.map(|f| f.trim().to_lowercase()).unwrap_or_default();
    ENTRIES
        .iter()
        .filter(|e| e.phrase.contains(&needle))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter() {
        assert_eq!(matching(None).len(), ENTRIES.len());
        let hits = matching(Some("  LOGIN "));
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|e| e.phrase.contains("login")));
        assert!(matching(Some("no such phrase here")).is_empty());
    }
}
