//! Question translation command

use anyhow::Result;
use colored::Colorize;
use loglens_core::AppConfig;
use loglens_nlp::{TranslationPath, Translator};

use crate::output::{self, OutputFormat};

pub async fn run(
    settings: &AppConfig,
    question: &str,
    tables: &[String],
    explain: bool,
    format: OutputFormat,
) -> Result<()> {
    let translator = Translator::from_config(settings);
    let translation = translator.translate_detailed(question, tables).await;

    if let Some(text) = output::structured(&translation, format)? {
        println!("{}", text);
        return Ok(());
    }

    println!("{}", translation.query);

    if let Some(reason) = &translation.fallback_reason {
        eprintln!("{} AI translation failed, used fallback: {}", "⚠".yellow(), reason);
    }

    if explain {
        output::section("Translation");
        output::key_value("Path", describe(translation.path));
        output::key_value("AI configured", if translator.has_ai() { "yes" } else { "no" });
        output::key_value("Known tables", &tables.len().to_string());
        let workspace = if settings.workspace.is_configured() {
            settings.workspace.workspace_id.as_deref().unwrap_or_default()
        } else {
            "not configured"
        };
        output::key_value("Workspace", workspace);
    }

    Ok(())
}

fn describe(path: TranslationPath) -> &'static str {
    match path {
        TranslationPath::Catalog => "catalog (exact)",
        TranslationPath::CatalogPartial => "catalog (phrase found in question)",
        TranslationPath::Heuristic => "heuristic",
        TranslationPath::Ai => "AI",
        TranslationPath::AiFallback => "heuristic after AI failure",
    }
}
