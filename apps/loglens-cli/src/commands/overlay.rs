//! Instruction overlay commands

use anyhow::Result;
use loglens_core::AppConfig;
use loglens_nlp::{InstructionStore, OverlayStatus};
use serde::Serialize;

use crate::output::{self, OutputFormat};
use crate::OverlayCommands;

#[derive(Debug, Serialize)]
struct OverlayReport {
    path: String,
    #[serde(flatten)]
    status: OverlayStatus,
    context: String,
}

pub fn run(settings: &AppConfig, cmd: &OverlayCommands, format: OutputFormat) -> Result<()> {
    let path = &settings.translator.overlay_path;
    let (store, status) = InstructionStore::load_with_status(path);

    let report = OverlayReport {
        path: path.display().to_string(),
        status,
        context: store.render_context(),
    };

    if let Some(text) = output::structured(&report, format)? {
        println!("{}", text);
        return Ok(());
    }

    match cmd {
        OverlayCommands::Show => {
            if report.context.is_empty() {
                output::dimmed("Overlay is empty; prompts use the built-in rules only.");
            } else {
                println!("{}", report.context);
            }
        }
        OverlayCommands::Check => {
            output::key_value("Path", &report.path);
            match &report.status {
                OverlayStatus::Loaded { .. } => output::success(&report.status.to_string()),
                OverlayStatus::Missing | OverlayStatus::Invalid { .. } => {
                    output::warning(&report.status.to_string())
                }
            }
        }
    }

    Ok(())
}
