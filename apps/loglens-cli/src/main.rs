//! LogLens CLI
//!
//! Translates natural-language questions into KQL for Azure Log Analytics.

mod commands;
mod config;
mod output;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "loglens",
    author = "LogLens Team",
    version,
    about = "Ask Azure Log Analytics questions in plain language",
    long_about = "Translates natural-language questions into KQL queries.\n\n\
                  Uses a curated query catalog and keyword heuristics, and an\n\
                  Azure OpenAI or OpenAI deployment when one is configured."
)]
pub struct Cli {
    /// Settings file (TOML, YAML or JSON); environment variables override it
    #[arg(short, long, env = "LOGLENS_CONFIG")]
    config: Option<String>,

    /// Instruction overlay document, overriding the configured path
    #[arg(long, env = "LOGLENS_OVERLAY")]
    overlay: Option<PathBuf>,

    /// Output format (text, json, yaml)
    #[arg(
        short,
        long,
        default_value = "text",
        value_parser = ["text", "json", "yaml"]
    )]
    format: String,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOGLENS_LOG", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a question into KQL
    Translate {
        /// The question to translate
        question: String,

        /// Table known to exist in the workspace (repeatable)
        #[arg(short, long = "table")]
        tables: Vec<String>,

        /// File with one workspace table name per line
        #[arg(long)]
        tables_file: Option<PathBuf>,

        /// Skip the AI even when it is configured
        #[arg(long)]
        no_ai: bool,

        /// Also report which path produced the query
        #[arg(short, long)]
        explain: bool,
    },

    /// Show the lexical hints and table choice for a question
    Hints {
        /// The question to analyse
        question: String,
    },

    /// List catalog entries
    Catalog {
        /// Only show entries whose phrase contains this text
        filter: Option<String>,
    },

    /// Inspect the instruction overlay
    #[command(subcommand)]
    Overlay(OverlayCommands),
}

#[derive(Subcommand)]
pub enum OverlayCommands {
    /// Print the rendered prompt context
    Show,
    /// Parse the overlay and report its sections
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = telemetry::init_telemetry(&cli.log_level, cli.json_logs) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        return ExitCode::FAILURE;
    }

    let result = run(&cli).await;

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            if cli.verbose {
                for cause in e.chain().skip(1) {
                    eprintln!("{}: {}", "Caused by".yellow(), cause);
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let format: OutputFormat = cli.format.parse().map_err(anyhow::Error::msg)?;

    match &cli.command {
        Commands::Translate {
            question,
            tables,
            tables_file,
            no_ai,
            explain,
        } => {
            let settings = config::load_settings(cli.config.as_deref(), cli.overlay.as_deref(), *no_ai)?;
            let tables = config::collect_tables(tables, tables_file.as_deref())?;
            commands::translate::run(&settings, question, &tables, *explain, format).await
        }
        Commands::Hints { question } => commands::hints::run(question, format),
        Commands::Catalog { filter } => commands::catalog::run(filter.as_deref(), format),
        Commands::Overlay(cmd) => {
            let settings = config::load_settings(cli.config.as_deref(), cli.overlay.as_deref(), true)?;
            commands::overlay::run(&settings, cmd, format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn test_parse_translate() {
        let cli = Cli::try_parse_from([
            "loglens",
            "--format",
            "json",
            "translate",
            "failed logins",
            "-t",
            "SigninLogs",
            "--table",
            "AuditLogs",
            "--no-ai",
        ])
        .unwrap();

        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Translate { question, tables, no_ai, .. } => {
                assert_eq!(question, "failed logins");
                assert_eq!(tables, vec!["SigninLogs", "AuditLogs"]);
                assert!(no_ai);
            }
            _ => panic!("expected translate"),
        }
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["loglens", "--format", "xml", "catalog"]).is_err());
    }
}
