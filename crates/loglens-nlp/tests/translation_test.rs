//! Integration tests for the translation engine.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use loglens_nlp::{
    catalog, heuristic, ChatCompletion, ChatRequest, DelegateSettings, InstructionOverlay,
    InstructionStore, NlpError, TranslationPath, Translator,
};
use parking_lot::Mutex;

struct FailingChat {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatCompletion for FailingChat {
    async fn complete(&self, _request: &ChatRequest) -> loglens_nlp::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NlpError::auth("invalid api key"))
    }
}

/// Echoes back a query naming the table the overlay told it to use.
struct RecordingChat {
    requests: Mutex<Vec<ChatRequest>>,
}

#[async_trait]
impl ChatCompletion for RecordingChat {
    async fn complete(&self, request: &ChatRequest) -> loglens_nlp::Result<String> {
        self.requests.lock().push(request.clone());
        tokio::task::yield_now().await;
        let table = request
            .user
            .lines()
            .find_map(|l| l.strip_prefix("- Operator rule: use table "))
            .unwrap_or("AzureDiagnostics")
            .to_string();
        Ok(format!("{} | take 100", table))
    }
}

fn offline() -> Translator {
    Translator::new(InstructionStore::empty())
}

fn overlay_version(tag: &str) -> InstructionOverlay {
    InstructionOverlay::from_yaml(&format!(
        "global_rules:\n  - overlay {tag}\ntable_mappings:\n  - triggers: [orders]\n    table: Orders{tag}_CL\n"
    ))
    .expect("overlay parses")
}

// ==================== Totality ====================

#[tokio::test]
async fn test_translate_always_returns_a_query() {
    let translator = offline();
    let long = "why ".repeat(5_000);
    let inputs = [
        "",
        "   ",
        "\t\n",
        "zzz qqq xyzzy",
        "¿qué pasó? 🚀",
        long.as_str(),
        "\"unterminated",
        "999.999.999.999 | drop table",
    ];

    for input in inputs {
        let query = translator.translate(input, &[]).await;
        assert!(!query.trim().is_empty(), "empty query for {:?}", input);
        assert!(query.chars().any(char::is_alphanumeric));
        if !query.contains("summarize") {
            assert!(query.contains("take 100"), "no row cap for {:?}: {}", input, query);
        }
    }
}

// ==================== Catalog ====================

#[tokio::test]
async fn test_every_catalog_key_translates_verbatim() {
    let translator = offline();
    for entry in catalog::ENTRIES {
        let result = translator.translate_detailed(entry.phrase, &[]).await;
        assert_eq!(result.query, entry.query, "key {:?}", entry.phrase);
        assert_eq!(result.path, TranslationPath::Catalog);
    }
}

#[tokio::test]
async fn test_catalog_is_not_mutated_by_translation() {
    fn fingerprint() -> u64 {
        let mut hasher = DefaultHasher::new();
        catalog::ENTRIES.hash(&mut hasher);
        hasher.finish()
    }

    let before = fingerprint();
    let translator = offline();
    for question in ["errors", "heartbeat 10.0.0.1", "vm web01 health", "who deleted things"] {
        translator.translate(question, &["Custom_CL".to_string()]).await;
    }
    assert_eq!(before, fingerprint());
}

// ==================== Gating ====================

#[tokio::test]
async fn test_entity_bypasses_catalog() {
    let translator = offline();
    let plain = translator.translate("heartbeat", &[]).await;
    let specific = translator.translate_detailed("heartbeat 10.0.0.1", &[]).await;

    assert_ne!(specific.query, plain);
    assert_eq!(specific.path, TranslationPath::Heuristic);
    assert!(specific.query.contains("ComputerIP == \"10.0.0.1\""));
}

// ==================== Table selection ====================

#[tokio::test]
async fn test_vm_availability_disambiguation() {
    let translator = offline();

    let vm = translator.translate("vm myhost availability", &[]).await;
    assert!(vm.starts_with("Heartbeat"));
    assert!(vm.contains("myhost"));
    assert!(!vm.contains("AppAvailabilityResults"));

    let web = translator.translate("web availability test for myhost", &[]).await;
    assert!(web.starts_with("AppAvailabilityResults"));
}

#[tokio::test]
async fn test_time_phrases() {
    let translator = offline();

    let hour = translator.translate("show me errors from last hour", &[]).await;
    assert!(hour.contains("ago(1h)"));

    let week = translator.translate("changes last 7 days", &[]).await;
    assert!(week.starts_with("AzureActivity"));
    assert!(week.contains("ago(7d)"));

    let default = translator.translate("pod logs with warnings", &[]).await;
    assert!(default.contains("ago(24h)"));
}

#[tokio::test]
async fn test_status_code_query() {
    let query = offline().translate("show status code 503 errors", &[]).await;
    assert!(query.contains("== 503"));
    assert!(query.contains("ago(24h)"));
    assert!(query.contains("take 100"));
}

#[tokio::test]
async fn test_workspace_table_is_honoured() {
    let tables = vec!["Orders_CL".to_string()];
    let query = offline().translate("latest orders_cl rows from checkout", &tables).await;
    assert!(query.starts_with("Orders_CL | where TimeGenerated > ago(24h)"));
}

// ==================== AI fallback ====================

#[tokio::test]
async fn test_failing_ai_matches_heuristic() {
    let chat = Arc::new(FailingChat {
        calls: AtomicUsize::new(0),
    });
    let translator = Translator::with_chat(
        chat.clone(),
        DelegateSettings::default(),
        InstructionStore::empty(),
    );

    let questions = [
        "show status code 503 errors",
        "vm myhost availability",
        "sign-ins for jane@contoso.com from 10.1.1.1",
        "which pods restarted yesterday",
        "anything weird going on",
    ];
    for question in questions {
        let result = translator.translate_detailed(question, &[]).await;
        assert_eq!(result.path, TranslationPath::AiFallback);
        assert_eq!(result.query, heuristic::translate(question, &[]));
    }
    assert_eq!(chat.calls.load(Ordering::SeqCst), questions.len());
}

// ==================== Overlay ====================

#[tokio::test]
async fn test_overlay_reload_is_atomic() {
    let chat = Arc::new(RecordingChat {
        requests: Mutex::new(Vec::new()),
    });
    let translator = Arc::new(Translator::with_chat(
        chat.clone(),
        DelegateSettings::default(),
        InstructionStore::empty(),
    ));
    translator.replace_overlay(overlay_version("A"));

    let writer = {
        let translator = Arc::clone(&translator);
        tokio::spawn(async move {
            for i in 0..200 {
                let tag = if i % 2 == 0 { "B" } else { "A" };
                translator.replace_overlay(overlay_version(tag));
                tokio::task::yield_now().await;
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let translator = Arc::clone(&translator);
            tokio::spawn(async move {
                let mut out = Vec::new();
                for _ in 0..50 {
                    out.push(translator.translate("recent orders errors", &[]).await);
                }
                out
            })
        })
        .collect();

    writer.await.expect("writer finished");
    for reader in futures::future::join_all(readers).await {
        for query in reader.expect("reader finished") {
            assert!(query.starts_with("OrdersA_CL") || query.starts_with("OrdersB_CL"));
        }
    }

    for request in chat.requests.lock().iter() {
        let system_a = request.system.contains("- overlay A");
        let system_b = request.system.contains("- overlay B");
        assert!(system_a != system_b, "exactly one overlay version in system prompt");
        if system_a {
            assert!(request.user.contains("use table OrdersA_CL"));
        } else {
            assert!(request.user.contains("use table OrdersB_CL"));
        }
    }
}

#[tokio::test]
async fn test_reload_from_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("kql_instructions.yaml");
    std::fs::write(&path, "global_rules:\n  - first rule\n").expect("write overlay");

    let translator = Translator::new(InstructionStore::load(&path));
    assert!(translator.instructions().render_context().contains("first rule"));

    std::fs::write(&path, "global_rules:\n  - second rule\n").expect("rewrite overlay");
    translator.reload_overlay();
    let context = translator.instructions().render_context();
    assert!(context.contains("second rule"));
    assert!(!context.contains("first rule"));

    std::fs::write(&path, "global_rules: [broken").expect("corrupt overlay");
    translator.reload_overlay();
    assert_eq!(translator.instructions().render_context(), "");
    // Translation is unaffected by a broken overlay.
    assert!(!translator.translate("errors", &[]).await.is_empty());
}
