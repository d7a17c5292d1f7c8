//! AI translation through a chat-completion capability.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::chat::{ChatCompletion, ChatRequest};
use crate::error::{NlpError, Result};
use crate::hints::LexicalHints;
use crate::overlay::OverlaySnapshot;
use crate::prompt;

// Openings that mark prose or a refusal rather than a query.
const REFUSAL_MARKERS: &[&str] = &[
    "error",
    "sorry",
    "i'm sorry",
    "i am sorry",
    "i cannot",
    "i can't",
    "unable to",
    "as an ai",
    "apologies",
];

/// Sampling and prompt limits for AI calls.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_prompt_tables: usize,
}

impl Default for DelegateSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.0,
            max_tokens: 500,
            max_prompt_tables: 30,
        }
    }
}

/// Turns a question into KQL with a chat model, or reports why it could not.
#[derive(Clone)]
pub struct AiDelegate {
    chat: Arc<dyn ChatCompletion>,
    settings: DelegateSettings,
}

impl std::fmt::Debug for AiDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiDelegate")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AiDelegate {
    pub fn new(chat: Arc<dyn ChatCompletion>, settings: DelegateSettings) -> Self {
        Self { chat, settings }
    }

    pub fn settings(&self) -> &DelegateSettings {
        &self.settings
    }

    /// Builds the request without sending it.
    pub fn build_request(
        &self,
        question: &str,
        known_tables: &[String],
        snapshot: &OverlaySnapshot,
    ) -> ChatRequest {
        let hints = LexicalHints::extract(question);
        ChatRequest {
            system: prompt::system_message(snapshot, known_tables, self.settings.max_prompt_tables),
            user: prompt::user_message(question, &hints, snapshot),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            model: self.settings.model.clone(),
        }
    }

    /// Asks the model for a query and returns the cleaned, validated text.
    #[instrument(skip_all, fields(question_len = question.len(), table_count = known_tables.len()))]
    pub async fn translate(
        &self,
        question: &str,
        known_tables: &[String],
        snapshot: &OverlaySnapshot,
    ) -> Result<String> {
        let request = self.build_request(question, known_tables, snapshot);
        let raw = self.chat.complete(&request).await?;
        let query = validate(&strip_code_fences(&raw))?;
        debug!(query_len = query.len(), "AI translation accepted");
        Ok(query)
    }
}

/// Removes a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    // Opening fence line, possibly "```kql".
    lines.remove(0);
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    let mut body = lines.join("\n");
    // A closing fence glued to the last line.
    if let Some(stripped) = body.trim_end().strip_suffix("```") {
        body = stripped.to_string();
    }
    body.trim().to_string()
}

/// Rejects output that does not look like a query.
pub fn validate(text: &str) -> Result<String> {
    let query = text.trim();
    if query.is_empty() {
        return Err(NlpError::empty_response("completion was blank after cleanup"));
    }

    let lower = query.to_lowercase();
    if let Some(marker) = REFUSAL_MARKERS.iter().find(|m| opens_with_word(&lower, m)) {
        return Err(NlpError::rejected(format!("completion starts with \"{}\"", marker)));
    }

    let leading_token = query
        .split(|c: char| c.is_whitespace() || c == '|')
        .next()
        .unwrap_or_default();
    let leading_is_identifier = !leading_token.is_empty()
        && leading_token
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_');
    if !query.contains('|') && !leading_is_identifier {
        return Err(NlpError::rejected("completion is neither a pipeline nor a table name"));
    }

    Ok(query.to_string())
}

// `marker` followed by a word boundary, so "errorlogs_cl" is not "error".
fn opens_with_word(text: &str, marker: &str) -> bool {
    text.strip_prefix(marker).is_some_and(|rest| {
        rest.chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::InstructionStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Canned {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatCompletion for Canned {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.seen.lock().push(request.clone());
            self.reply.clone().map_err(NlpError::server)
        }
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```kql\nHeartbeat | take 10\n```"), "Heartbeat | take 10");
        assert_eq!(strip_code_fences("```\nPerf\n| take 5\n```"), "Perf\n| take 5");
        assert_eq!(strip_code_fences("```kql\nHeartbeat | take 10```"), "Heartbeat | take 10");
        assert_eq!(strip_code_fences("  Heartbeat  "), "Heartbeat");
    }

    #[test]
    fn test_validate() {
        assert!(validate("AppRequests | take 10").is_ok());
        assert!(validate("Heartbeat").is_ok());
        assert!(validate("").is_err());
        assert!(validate("ERROR: cannot translate").is_err());
        assert!(validate("I'm sorry, I can't help with that").is_err());
        assert!(validate("Sorry | nope").is_err());
        assert!(validate("...").is_err());
    }

    #[test]
    fn test_validate_accepts_tables_named_like_markers() {
        assert!(validate("ErrorLogs_CL | take 100").is_ok());
        assert!(validate("SorryTable_CL").is_ok());
        assert!(validate("Error | take 1").is_err());
    }

    #[tokio::test]
    async fn test_translate_cleans_reply() {
        let chat = Canned::ok("```kql\nSigninLogs | where ResultType != \"0\" | take 100\n```");
        let delegate = AiDelegate::new(chat.clone(), DelegateSettings::default());
        let snapshot = InstructionStore::empty().snapshot();

        let query = delegate
            .translate("failed sign-ins", &["SigninLogs".to_string()], &snapshot)
            .await
            .unwrap();
        assert_eq!(query, "SigninLogs | where ResultType != \"0\" | take 100");

        let seen = chat.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, 0.0);
        assert_eq!(seen[0].max_tokens, 500);
        assert_eq!(seen[0].model, "gpt-4");
        assert!(seen[0].user.starts_with("Convert this to KQL: failed sign-ins"));
        assert!(seen[0].system.ends_with("Available tables in this workspace: SigninLogs"));
    }

    #[tokio::test]
    async fn test_translate_rejects_prose() {
        let delegate = AiDelegate::new(
            Canned::ok("I'm sorry, I cannot do that."),
            DelegateSettings::default(),
        );
        let snapshot = InstructionStore::empty().snapshot();
        let err = delegate.translate("anything", &[], &snapshot).await.unwrap_err();
        assert!(matches!(err, NlpError::RejectedOutput(_)));
    }
}
