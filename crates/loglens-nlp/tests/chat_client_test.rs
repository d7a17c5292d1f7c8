//! HTTP-level tests for the chat client against a mock server.

use std::sync::Arc;

use loglens_core::LlmProvider;
use loglens_nlp::{
    ChatCompletion, ChatRequest, DelegateSettings, InstructionStore, NlpError, OpenAiChatClient,
    TranslationPath, Translator,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> ChatRequest {
    ChatRequest {
        system: "system rules".to_string(),
        user: "Convert this to KQL: errors".to_string(),
        temperature: 0.0,
        max_tokens: 500,
        model: "kql-deploy".to_string(),
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

fn azure_client(server: &MockServer) -> OpenAiChatClient {
    OpenAiChatClient::builder()
        .provider(LlmProvider::Azure)
        .endpoint(Some(server.uri()))
        .api_key("azure-key")
        .build()
        .expect("client builds")
}

#[tokio::test]
async fn test_azure_route_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/kql-deploy/chat/completions"))
        .and(query_param("api-version", "2024-02-15-preview"))
        .and(header("api-key", "azure-key"))
        .and(body_partial_json(json!({
            "temperature": 0.0,
            "max_tokens": 500,
            "messages": [
                { "role": "system", "content": "system rules" },
                { "role": "user", "content": "Convert this to KQL: errors" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("AzureDiagnostics | take 100")))
        .expect(1)
        .mount(&server)
        .await;

    let text = azure_client(&server)
        .complete(&request())
        .await
        .expect("completion succeeds");
    assert_eq!(text, "AzureDiagnostics | take 100");
}

#[tokio::test]
async fn test_openai_route_uses_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer openai-key"))
        .and(body_partial_json(json!({ "model": "kql-deploy" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Heartbeat | take 100")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiChatClient::builder()
        .provider(LlmProvider::OpenAi)
        .endpoint(Some(format!("{}/v1", server.uri())))
        .api_key("openai-key")
        .build()
        .expect("client builds");

    let text = client.complete(&request()).await.expect("completion succeeds");
    assert_eq!(text, "Heartbeat | take 100");
}

#[tokio::test]
async fn test_error_status_mapping() {
    let cases: [(u16, &str); 4] = [
        (401, "auth"),
        (429, "rate"),
        (503, "server"),
        (400, "api"),
    ];

    for (status, kind) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = azure_client(&server)
            .complete(&request())
            .await
            .expect_err("status should fail");
        let matched = match kind {
            "auth" => matches!(err, NlpError::Auth(_)),
            "rate" => matches!(err, NlpError::RateLimit { .. }),
            "server" => matches!(err, NlpError::Server(_)),
            _ => matches!(err, NlpError::Api { status: 400, .. }),
        };
        assert!(matched, "status {} gave {:?}", status, err);
    }
}

#[tokio::test]
async fn test_empty_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = azure_client(&server)
        .complete(&request())
        .await
        .expect_err("no choices");
    assert!(matches!(err, NlpError::EmptyResponse(_)));
}

#[tokio::test]
async fn test_translator_falls_back_when_endpoint_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let translator = Translator::with_chat(
        Arc::new(azure_client(&server)),
        DelegateSettings::default(),
        InstructionStore::empty(),
    );
    let result = translator
        .translate_detailed("show status code 503 errors", &[])
        .await;
    assert_eq!(result.path, TranslationPath::AiFallback);
    assert!(result.query.contains("== 503"));
}

#[tokio::test]
async fn test_translator_accepts_fenced_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("```kql\nSigninLogs\n| where ResultType != \"0\"\n| take 100\n```")),
        )
        .mount(&server)
        .await;

    let translator = Translator::with_chat(
        Arc::new(azure_client(&server)),
        DelegateSettings::default(),
        InstructionStore::empty(),
    );
    let result = translator
        .translate_detailed("failed sign-ins this week", &["SigninLogs".to_string()])
        .await;
    assert_eq!(result.path, TranslationPath::Ai);
    assert_eq!(result.query, "SigninLogs\n| where ResultType != \"0\"\n| take 100");
}
