//! Operator instruction overlay.
//!
//! The overlay is a YAML (or JSON) document of optional sections that adds
//! local knowledge to the AI prompt: table overrides, aliases, guardrails and
//! so on. Each section is parsed on its own; a malformed section is dropped
//! with a warning and unknown keys are ignored, so a partially broken file
//! still contributes whatever is valid.
//!
//! [`InstructionStore`] owns the current overlay together with its rendered
//! prompt context. Both live in one immutable [`OverlaySnapshot`] that is
//! swapped as a unit, so a reader holding a snapshot never sees the context
//! of one document paired with the sections of another.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{NlpError, Result};

/// Identity of the assistant the prompt speaks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub name: Option<String>,
    pub role: Option<String>,
    pub responsibilities: Vec<String>,
}

impl AgentSection {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none() && self.responsibilities.is_empty()
    }
}

/// Routes questions containing any trigger to a specific table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableMapping {
    pub triggers: Vec<String>,
    pub table: String,
    pub key_column: Option<String>,
    pub note: Option<String>,
}

impl TableMapping {
    /// True when any trigger occurs in the lowercased question.
    pub fn matches(&self, lower_question: &str) -> bool {
        self.triggers
            .iter()
            .map(|t| t.trim().to_lowercase())
            .any(|t| !t.is_empty() && lower_question.contains(&t))
    }

    fn describe(&self) -> String {
        let mut line = format!("- When the question mentions {} use {}", self.triggers.join(", "), self.table);
        if let Some(column) = &self.key_column {
            line.push_str(&format!(" (key column: {})", column));
        }
        if let Some(note) = &self.note {
            line.push_str(&format!(". {}", note));
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceGuardrails {
    pub must_do: Vec<String>,
    pub avoid: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGuardrails {
    pub must_not: Vec<String>,
}

/// A parsed overlay document. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstructionOverlay {
    pub agent: AgentSection,
    pub priorities: Vec<String>,
    pub global_rules: Vec<String>,
    /// Phrase to KQL time expression
    pub time_mappings: BTreeMap<String, String>,
    pub table_mappings: Vec<TableMapping>,
    pub phrase_interpretations: BTreeMap<String, String>,
    pub kql_patterns: BTreeMap<String, String>,
    /// Friendly name to canonical resource identifier
    pub resource_aliases: BTreeMap<String, String>,
    /// Table to concept to column name
    pub column_mappings: BTreeMap<String, BTreeMap<String, String>>,
    pub performance: PerformanceGuardrails,
    pub security: SecurityGuardrails,
    pub templates: BTreeMap<String, String>,
    pub business_context: Vec<String>,
    pub output_format: Vec<String>,
}

impl InstructionOverlay {
    /// Parses a document, keeping every section that deserializes cleanly.
    ///
    /// Only a document that is not a mapping at all is an error.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let document: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| NlpError::overlay(e.to_string()))?;

        let mapping = match document {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => return Ok(Self::default()),
            _ => return Err(NlpError::overlay("top level must be a mapping of sections")),
        };

        let mut overlay = Self::default();
        for (key, value) in mapping {
            let Some(name) = key.as_str() else {
                debug!(?key, "Ignoring non-string overlay key");
                continue;
            };
            if value.is_null() {
                continue;
            }
            match name {
                "agent" => section(name, value, &mut overlay.agent),
                "priorities" => section(name, value, &mut overlay.priorities),
                "global_rules" => section(name, value, &mut overlay.global_rules),
                "time_mappings" => section(name, value, &mut overlay.time_mappings),
                "table_mappings" => section(name, value, &mut overlay.table_mappings),
                "phrase_interpretations" => section(name, value, &mut overlay.phrase_interpretations),
                "kql_patterns" => section(name, value, &mut overlay.kql_patterns),
                "resource_aliases" => section(name, value, &mut overlay.resource_aliases),
                "column_mappings" => section(name, value, &mut overlay.column_mappings),
                "performance" => section(name, value, &mut overlay.performance),
                "security" => section(name, value, &mut overlay.security),
                "templates" => section(name, value, &mut overlay.templates),
                "business_context" => section(name, value, &mut overlay.business_context),
                "output_format" => section(name, value, &mut overlay.output_format),
                other => debug!(section = other, "Ignoring unknown overlay section"),
            }
        }

        overlay.table_mappings.retain(|m| {
            let usable = !m.table.trim().is_empty() && !m.triggers.is_empty();
            if !usable {
                warn!(table = %m.table, "Dropping table mapping without table or triggers");
            }
            usable
        });

        Ok(overlay)
    }

    /// Number of non-empty sections.
    pub fn section_count(&self) -> usize {
        [
            !self.agent.is_empty(),
            !self.priorities.is_empty(),
            !self.global_rules.is_empty(),
            !self.time_mappings.is_empty(),
            !self.table_mappings.is_empty(),
            !self.phrase_interpretations.is_empty(),
            !self.kql_patterns.is_empty(),
            !self.resource_aliases.is_empty(),
            !self.column_mappings.is_empty(),
            !self.performance.must_do.is_empty() || !self.performance.avoid.is_empty(),
            !self.security.must_not.is_empty(),
            !self.templates.is_empty(),
            !self.business_context.is_empty(),
            !self.output_format.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.section_count() == 0
    }

    /// Table overrides whose triggers occur in the question.
    pub fn matching_table_mappings(&self, lower_question: &str) -> Vec<&TableMapping> {
        self.table_mappings
            .iter()
            .filter(|m| m.matches(lower_question))
            .collect()
    }

    /// Aliases whose friendly name occurs in the question.
    pub fn matching_aliases(&self, lower_question: &str) -> Vec<(&str, &str)> {
        self.resource_aliases
            .iter()
            .filter(|(alias, _)| {
                let alias = alias.trim().to_lowercase();
                !alias.is_empty() && lower_question.contains(&alias)
            })
            .map(|(alias, canonical)| (alias.as_str(), canonical.as_str()))
            .collect()
    }

    /// Flattens the present sections into prompt text, in a fixed order.
    pub fn render(&self) -> String {
        let mut blocks = Vec::new();

        if !self.agent.is_empty() {
            let mut lines = vec!["## Agent".to_string()];
            if let Some(name) = &self.agent.name {
                lines.push(format!("Name: {}", name));
            }
            if let Some(role) = &self.agent.role {
                lines.push(format!("Role: {}", role));
            }
            if !self.agent.responsibilities.is_empty() {
                lines.push("Responsibilities:".to_string());
                lines.extend(bullets(&self.agent.responsibilities));
            }
            blocks.push(lines.join("\n"));
        }

        if !self.priorities.is_empty() {
            let numbered = self
                .priorities
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}. {}", i + 1, p));
            blocks.push(block("## Priorities", numbered));
        }
        if !self.global_rules.is_empty() {
            blocks.push(block("## Global Rules", bullets(&self.global_rules)));
        }
        if !self.time_mappings.is_empty() {
            let rows = self
                .time_mappings
                .iter()
                .map(|(phrase, expr)| format!("- \"{}\" => {}", phrase, expr));
            blocks.push(block("## Time Phrase Mappings", rows));
        }
        if !self.table_mappings.is_empty() {
            let rows = self.table_mappings.iter().map(TableMapping::describe);
            blocks.push(block("## Table Mapping Overrides", rows));
        }
        if !self.phrase_interpretations.is_empty() {
            let rows = self
                .phrase_interpretations
                .iter()
                .map(|(phrase, fragment)| format!("- \"{}\" means {}", phrase, fragment));
            blocks.push(block("## Phrase Interpretations", rows));
        }
        if !self.kql_patterns.is_empty() {
            let rows = self
                .kql_patterns
                .iter()
                .map(|(name, snippet)| format!("- {}: {}", name, snippet));
            blocks.push(block("## KQL Patterns", rows));
        }
        if !self.resource_aliases.is_empty() {
            let rows = self
                .resource_aliases
                .iter()
                .map(|(alias, canonical)| format!("- {} => {}", alias, canonical));
            blocks.push(block("## Resource Aliases", rows));
        }
        if !self.column_mappings.is_empty() {
            let rows = self.column_mappings.iter().map(|(table, columns)| {
                let pairs: Vec<String> = columns
                    .iter()
                    .map(|(concept, column)| format!("{}={}", concept, column))
                    .collect();
                format!("- {}: {}", table, pairs.join(", "))
            });
            blocks.push(block("## Column Names By Table", rows));
        }
        if !self.performance.must_do.is_empty() || !self.performance.avoid.is_empty() {
            let mut lines = vec!["## Performance".to_string()];
            if !self.performance.must_do.is_empty() {
                lines.push("Must do:".to_string());
                lines.extend(bullets(&self.performance.must_do));
            }
            if !self.performance.avoid.is_empty() {
                lines.push("Avoid:".to_string());
                lines.extend(bullets(&self.performance.avoid));
            }
            blocks.push(lines.join("\n"));
        }
        if !self.security.must_not.is_empty() {
            blocks.push(block("## Security\nMust not:", bullets(&self.security.must_not)));
        }
        if !self.templates.is_empty() {
            let rows = self
                .templates
                .iter()
                .map(|(name, body)| format!("### {}\n{}", name, body.trim_end()));
            blocks.push(block("## Templates", rows));
        }
        if !self.business_context.is_empty() {
            blocks.push(block("## Business Context", bullets(&self.business_context)));
        }
        if !self.output_format.is_empty() {
            blocks.push(block("## Output Format", bullets(&self.output_format)));
        }

        blocks.join("\n\n")
    }
}

fn section<T: DeserializeOwned>(name: &str, value: serde_yaml::Value, slot: &mut T) {
    match serde_yaml::from_value::<T>(value) {
        Ok(parsed) => *slot = parsed,
        Err(e) => warn!(section = name, error = %e, "Dropping malformed overlay section"),
    }
}

fn bullets(items: &[String]) -> impl Iterator<Item = String> + '_ {
    items.iter().map(|item| format!("- {}", item))
}

fn block(heading: &str, rows: impl Iterator<Item = String>) -> String {
    std::iter::once(heading.to_string())
        .chain(rows)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Outcome of loading or replacing the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OverlayStatus {
    Loaded { sections: usize },
    Missing,
    Invalid { reason: String },
}

impl fmt::Display for OverlayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded { sections } => write!(f, "loaded {} section(s)", sections),
            Self::Missing => write!(f, "no overlay document"),
            Self::Invalid { reason } => write!(f, "invalid overlay document: {}", reason),
        }
    }
}

/// An overlay paired with its lazily rendered prompt context.
#[derive(Debug)]
pub struct OverlaySnapshot {
    overlay: InstructionOverlay,
    version: u64,
    context: OnceCell<String>,
}

impl OverlaySnapshot {
    fn new(overlay: InstructionOverlay, version: u64) -> Self {
        Self {
            overlay,
            version,
            context: OnceCell::new(),
        }
    }

    pub fn overlay(&self) -> &InstructionOverlay {
        &self.overlay
    }

    /// Increases with every load, reload or replace.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Rendered context, computed on first use and cached for this snapshot.
    pub fn context(&self) -> &str {
        self.context.get_or_init(|| self.overlay.render())
    }
}

/// Holder of the current overlay snapshot.
pub struct InstructionStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<OverlaySnapshot>>,
}

impl InstructionStore {
    /// A store with no backing document.
    pub fn empty() -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(OverlaySnapshot::new(InstructionOverlay::default(), 0))),
        }
    }

    /// Loads `path` if it exists. A missing or broken document yields an
    /// empty overlay.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self::load_with_status(path).0
    }

    /// Like [`load`](Self::load), also returning how the read went.
    pub fn load_with_status(path: impl Into<PathBuf>) -> (Self, OverlayStatus) {
        let path = path.into();
        let (overlay, status) = read_overlay(&path);
        log_status(&path, &status);
        let store = Self {
            path: Some(path),
            current: RwLock::new(Arc::new(OverlaySnapshot::new(overlay, 1))),
        };
        (store, status)
    }

    /// Path of the backing document, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-reads the backing document and swaps it in.
    pub fn reload(&self) -> OverlayStatus {
        let Some(path) = &self.path else {
            return OverlayStatus::Missing;
        };
        let (overlay, status) = read_overlay(path);
        log_status(path, &status);
        self.swap(overlay);
        status
    }

    /// Swaps in an overlay supplied directly.
    pub fn replace(&self, overlay: InstructionOverlay) -> OverlayStatus {
        let sections = overlay.section_count();
        self.swap(overlay);
        OverlayStatus::Loaded { sections }
    }

    /// The current snapshot; stays valid across later swaps.
    pub fn snapshot(&self) -> Arc<OverlaySnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Rendered context of the current snapshot.
    pub fn render_context(&self) -> String {
        self.snapshot().context().to_string()
    }

    fn swap(&self, overlay: InstructionOverlay) {
        let mut current = self.current.write();
        let version = current.version + 1;
        *current = Arc::new(OverlaySnapshot::new(overlay, version));
        debug!(version, "Overlay swapped");
    }
}

impl Default for InstructionStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for InstructionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionStore")
            .field("path", &self.path)
            .field("version", &self.current.read().version)
            .finish()
    }
}

fn read_overlay(path: &Path) -> (InstructionOverlay, OverlayStatus) {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (InstructionOverlay::default(), OverlayStatus::Missing)
        }
        Err(e) => {
            return (
                InstructionOverlay::default(),
                OverlayStatus::Invalid {
                    reason: e.to_string(),
                },
            )
        }
    };

    match InstructionOverlay::from_yaml(&text) {
        Ok(overlay) => {
            let sections = overlay.section_count();
            (overlay, OverlayStatus::Loaded { sections })
        }
        Err(e) => (
            InstructionOverlay::default(),
            OverlayStatus::Invalid {
                reason: e.to_string(),
            },
        ),
    }
}

fn log_status(path: &Path, status: &OverlayStatus) {
    match status {
        OverlayStatus::Loaded { sections } => {
            info!(path = %path.display(), sections, "Instruction overlay loaded")
        }
        OverlayStatus::Missing => {
            debug!(path = %path.display(), "No instruction overlay found")
        }
        OverlayStatus::Invalid { reason } => {
            warn!(path = %path.display(), %reason, "Instruction overlay unreadable, using empty overlay")
        }
    }
}
