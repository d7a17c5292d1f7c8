//! Translation orchestrator.
//!
//! Routes each question to the cheapest path that can answer it: an exact
//! catalog hit, a gated substring hit, the AI delegate, or the heuristic
//! table selector. Every failure degrades to a heuristic query, so
//! [`Translator::translate`] always returns text.

use std::sync::Arc;

use loglens_core::{AppConfig, QueryRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::catalog;
use crate::chat::{ChatCompletion, OpenAiChatClient};
use crate::delegate::{AiDelegate, DelegateSettings};
use crate::heuristic::{self, has_specific_intent};
use crate::overlay::{InstructionOverlay, InstructionStore, OverlayStatus};

/// Which path produced a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationPath {
    /// Exact catalog key
    Catalog,
    /// Catalog key found inside the question
    CatalogPartial,
    Heuristic,
    Ai,
    /// AI was tried and failed; heuristic result returned
    AiFallback,
}

/// A translated query plus how it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub query: String,
    pub path: TranslationPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl Translation {
    fn new(query: impl Into<String>, path: TranslationPath) -> Self {
        Self {
            query: query.into(),
            path,
            fallback_reason: None,
        }
    }
}

/// Natural-language to KQL translator.
pub struct Translator {
    delegate: Option<AiDelegate>,
    instructions: InstructionStore,
}

impl Translator {
    /// Translator without AI; answers come from the catalog and heuristics.
    pub fn new(instructions: InstructionStore) -> Self {
        info!("Initializing translator without AI");
        Self {
            delegate: None,
            instructions,
        }
    }

    /// Translator that consults `chat` for non-trivial questions.
    pub fn with_chat(
        chat: Arc<dyn ChatCompletion>,
        settings: DelegateSettings,
        instructions: InstructionStore,
    ) -> Self {
        info!(model = %settings.model, "Initializing translator with AI");
        Self {
            delegate: Some(AiDelegate::new(chat, settings)),
            instructions,
        }
    }

    /// Builds a translator from application settings.
    ///
    /// Incomplete or unusable LLM settings disable AI instead of failing.
    pub fn from_config(config: &AppConfig) -> Self {
        let instructions = InstructionStore::load(&config.translator.overlay_path);

        if !config.translator.ai_enabled {
            return Self::new(instructions);
        }
        if !config.llm.is_configured() {
            info!("No LLM endpoint configured, AI translation disabled");
            return Self::new(instructions);
        }

        match OpenAiChatClient::from_config(&config.llm) {
            Ok(client) => {
                let settings = DelegateSettings {
                    model: config.llm.model.clone(),
                    temperature: config.llm.temperature,
                    max_tokens: config.llm.max_tokens,
                    max_prompt_tables: config.translator.max_prompt_tables,
                };
                Self::with_chat(Arc::new(client), settings, instructions)
            }
            Err(e) => {
                warn!(error = %e, "Chat client unavailable, AI translation disabled");
                Self::new(instructions)
            }
        }
    }

    pub fn has_ai(&self) -> bool {
        self.delegate.is_some()
    }

    pub fn instructions(&self) -> &InstructionStore {
        &self.instructions
    }

    /// Re-reads the overlay document.
    pub fn reload_overlay(&self) -> OverlayStatus {
        let status = self.instructions.reload();
        info!(%status, "Overlay reloaded");
        status
    }

    /// Installs an overlay supplied directly.
    pub fn replace_overlay(&self, overlay: InstructionOverlay) -> OverlayStatus {
        self.instructions.replace(overlay)
    }

    /// Translates a question to KQL. Never fails.
    pub async fn translate(&self, question: &str, known_tables: &[String]) -> String {
        self.translate_detailed(question, known_tables).await.query
    }

    pub async fn translate_request(&self, request: &QueryRequest) -> Translation {
        self.translate_detailed(&request.question, &request.known_tables)
            .await
    }

    /// Translates and reports the path taken.
    #[instrument(skip_all, fields(question_len = question.len(), table_count = known_tables.len()))]
    pub async fn translate_detailed(&self, question: &str, known_tables: &[String]) -> Translation {
        let normalized = question.trim().to_lowercase();

        if let Some(delegate) = &self.delegate {
            if !normalized.is_empty() && !is_simple_shortcut(question, &normalized) {
                // One snapshot serves the whole call.
                let snapshot = self.instructions.snapshot();
                return match delegate.translate(question, known_tables, &snapshot).await {
                    Ok(query) => {
                        info!(path = "ai", overlay_version = snapshot.version(), "Translated question");
                        Translation::new(query, TranslationPath::Ai)
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            status = ?e.status_code(),
                            retryable = e.is_retryable(),
                            "AI translation failed, using heuristic fallback"
                        );
                        Translation {
                            query: heuristic::translate(question, known_tables),
                            path: TranslationPath::AiFallback,
                            fallback_reason: Some(e.to_string()),
                        }
                    }
                };
            }
            debug!("Simple shortcut, skipping AI");
        }

        let translation = self.translate_offline(question, known_tables);
        info!(path = ?translation.path, "Translated question");
        translation
    }

    /// The non-AI path: exact catalog, gated substring catalog, heuristic.
    pub fn translate_offline(&self, question: &str, known_tables: &[String]) -> Translation {
        let normalized = question.trim().to_lowercase();

        if let Some(query) = catalog::lookup_exact(&normalized) {
            return Translation::new(query, TranslationPath::Catalog);
        }

        if !has_specific_intent(question) {
            if let Some(entry) = catalog::lookup_partial(&normalized) {
                debug!(key = entry.phrase, "Catalog key found in question");
                return Translation::new(entry.query, TranslationPath::CatalogPartial);
            }
        }

        Translation::new(
            heuristic::translate(question, known_tables),
            TranslationPath::Heuristic,
        )
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("delegate", &self.delegate)
            .field("instructions", &self.instructions)
            .finish()
    }
}

/// Short questions that exactly name a catalog entry and carry no entity
/// or filter are answered from the catalog even when AI is available.
pub fn is_simple_shortcut(question: &str, normalized: &str) -> bool {
    normalized.split_whitespace().count() <= 2
        && catalog::is_key(normalized)
        && !has_specific_intent(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NlpError, Result};
    use crate::chat::ChatRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatCompletion for Scripted {
        async fn complete(&self, _request: &ChatRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .ok_or_else(|| NlpError::server("upstream unavailable"))
        }
    }

    fn with_reply(reply: Option<&'static str>) -> (Translator, Arc<Scripted>) {
        let chat = Arc::new(Scripted {
            reply,
            calls: AtomicUsize::new(0),
        });
        let translator = Translator::with_chat(
            chat.clone(),
            DelegateSettings::default(),
            InstructionStore::empty(),
        );
        (translator, chat)
    }

    #[tokio::test]
    async fn test_offline_exact_catalog() {
        let translator = Translator::new(InstructionStore::empty());
        let result = translator.translate_detailed("  Heartbeat ", &[]).await;
        assert_eq!(result.path, TranslationPath::Catalog);
        assert_eq!(Some(result.query.as_str()), catalog::lookup_exact("heartbeat"));
    }

    #[tokio::test]
    async fn test_offline_partial_catalog_is_gated() {
        let translator = Translator::new(InstructionStore::empty());

        let vague = translator.translate_detailed("show me errors", &[]).await;
        assert_eq!(vague.path, TranslationPath::CatalogPartial);

        let specific = translator.translate_detailed("heartbeat 10.0.0.1", &[]).await;
        assert_eq!(specific.path, TranslationPath::Heuristic);
        assert!(specific.query.contains("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_ai_used_for_open_questions() {
        let (translator, chat) = with_reply(Some("AppRequests | where Success == false | take 100"));
        let result = translator
            .translate_detailed("which endpoints failed most this morning", &[])
            .await;
        assert_eq!(result.path, TranslationPath::Ai);
        assert_eq!(result.query, "AppRequests | where Success == false | take 100");
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_simple_shortcut_skips_ai() {
        let (translator, chat) = with_reply(Some("Should | not | be | used"));
        let result = translator.translate_detailed("errors", &[]).await;
        assert_eq!(result.path, TranslationPath::Catalog);
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_question_skips_ai() {
        let (translator, chat) = with_reply(Some("Heartbeat"));
        let query = translator.translate("   ", &[]).await;
        assert!(query.contains("take 100"));
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ai_failure_falls_back_to_heuristic() {
        let (translator, _) = with_reply(None);
        let question = "show status code 503 errors";
        let result = translator.translate_detailed(question, &[]).await;
        assert_eq!(result.path, TranslationPath::AiFallback);
        assert_eq!(result.query, heuristic::translate(question, &[]));
        assert!(result.fallback_reason.unwrap().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn test_rejected_output_falls_back() {
        let (translator, _) = with_reply(Some("Sorry, I can't help with that."));
        let result = translator.translate_detailed("vm myhost availability", &[]).await;
        assert_eq!(result.path, TranslationPath::AiFallback);
        assert!(result.query.starts_with("Heartbeat"));
    }

    #[test]
    fn test_simple_shortcut_rules() {
        assert!(is_simple_shortcut("errors", "errors"));
        assert!(is_simple_shortcut("Failed Logins", "failed logins"));
        assert!(!is_simple_shortcut("errors please", "errors please"));
        assert!(!is_simple_shortcut("show me the errors", "show me the errors"));
    }

    #[test]
    fn test_from_config_without_llm() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.translator.overlay_path = dir.path().join("missing.yaml");
        let translator = Translator::from_config(&config);
        assert!(!translator.has_ai());
        assert!(translator.instructions().snapshot().overlay().is_empty());
    }
}
