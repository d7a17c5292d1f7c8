//! Settings and table-list loading for CLI commands

use std::path::Path;

use anyhow::{Context, Result};
use loglens_core::AppConfig;
use tracing::debug;

/// Loads settings from a file or the environment, then applies CLI overrides.
pub fn load_settings(file: Option<&str>, overlay: Option<&Path>, no_ai: bool) -> Result<AppConfig> {
    let mut settings = match file {
        Some(path) => {
            let mut settings = AppConfig::load_from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path))?;
            settings.apply_legacy_env();
            settings
        }
        None => AppConfig::load().context("Failed to load settings from environment")?,
    };

    if let Some(path) = overlay {
        settings.translator.overlay_path = path.to_path_buf();
    }
    if no_ai {
        settings.translator.ai_enabled = false;
    }

    settings.validate().context("Invalid settings")?;

    debug!(
        overlay = %settings.translator.overlay_path.display(),
        ai_enabled = settings.translator.ai_enabled,
        "Settings loaded"
    );

    Ok(settings)
}

/// Merges `--table` values with the lines of an optional tables file.
pub fn collect_tables(tables: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut all: Vec<String> = tables.to_vec();

    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tables file {}", path.display()))?;
        all.extend(parse_table_list(&content));
    }

    let mut seen = std::collections::HashSet::new();
    all.retain(|t| !t.is_empty() && seen.insert(t.to_lowercase()));
    Ok(all)
}

/// One table per line; blank lines and `#` comments are skipped.
fn parse_table_list(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_collect_tables_merges_and_dedupes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# workspace tables\nHeartbeat\n\nsigninlogs\nOrders_CL").unwrap();

        let tables = collect_tables(
            &["SigninLogs".to_string(), "Heartbeat".to_string()],
            Some(file.path()),
        )
        .unwrap();
        assert_eq!(tables, vec!["SigninLogs", "Heartbeat", "Orders_CL"]);
    }

    #[test]
    fn test_missing_tables_file_is_an_error() {
        assert!(collect_tables(&[], Some(Path::new("/definitely/not/here.txt"))).is_err());
    }

    #[test]
    fn test_settings_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[translator]\nmax_prompt_tables = 5").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let settings = load_settings(Some(&path), Some(Path::new("rules.yaml")), true).unwrap();
        assert_eq!(settings.translator.max_prompt_tables, 5);
        assert_eq!(settings.translator.overlay_path, Path::new("rules.yaml"));
        assert!(!settings.translator.ai_enabled);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[llm]\nmax_tokens = 0").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let err = load_settings(Some(&path), None, false).unwrap_err();
        assert!(format!("{:#}", err).contains("max_tokens"));
    }
}
