//! Hint inspection command

use anyhow::Result;
use loglens_nlp::{has_specific_intent, HeuristicPlan, LexicalHints, TableSelection, TimeWindow};
use serde::Serialize;

use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize)]
struct HintReport {
    question: String,
    hints: LexicalHints,
    specific_intent: bool,
    table: TableSelection,
    time_window: TimeWindow,
    heuristic_query: String,
}

impl HintReport {
    fn new(question: &str) -> Self {
        let plan = HeuristicPlan::build(question, &[]);
        Self {
            question: question.to_string(),
            hints: LexicalHints::extract(question),
            specific_intent: has_specific_intent(question),
            heuristic_query: plan.to_kql(),
            table: plan.selection,
            time_window: plan.time,
        }
    }
}

pub fn run(question: &str, format: OutputFormat) -> Result<()> {
    let report = HintReport::new(question);

    if let Some(text) = output::structured(&report, format)? {
        println!("{}", text);
        return Ok(());
    }

    output::section("Hints");
    let lines = report.hints.lines();
    if lines.is_empty() {
        output::dimmed("No hints found.");
    }
    for (i, line) in lines.iter().enumerate() {
        output::list_item(i + 1, line);
    }

    output::section("Routing");
    output::key_value(
        "Specific intent",
        if report.specific_intent { "yes (catalog phrases bypassed)" } else { "no" },
    );
    output::key_value(
        "Table",
        &format!("{} (rule: {})", report.table.table, report.table.rule),
    );
    output::key_value("Time filter", &report.time_window.clause());
    output::key_value("Heuristic query", &report.heuristic_query);

    Ok(())
}
