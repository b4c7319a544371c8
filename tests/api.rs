//! Integration tests for the HTTP API.
//!
//! Every test runs the real router on a local port and points it at a fake
//! provider, so no network access or API key is needed. Tests that render or
//! parse PDFs need libpdfium; they are `#[ignore]`d and show up as ignored in
//! a plain run. Run them with:
//!
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test -- --ignored

mod common;

use common::{FakeProvider, CLAUDE_ANSWER, OPENAI_CLEANED};
use paper_review_assistant::{
    router, AppState, AssistantConfig, PdfEngine, ProviderConfig, ProviderKind,
};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Api {
    base: String,
    client: reqwest::Client,
}

impl Api {
    async fn start(config: AssistantConfig, engine: Option<PdfEngine>) -> Self {
        let state = AppState::new(config, engine).unwrap();
        let addr = common::spawn(router(state)).await;
        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
        }
    }

    async fn plain() -> Self {
        Self::start(AssistantConfig::default(), None).await
    }

    async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn upload(&self, bytes: Vec<u8>) -> (StatusCode, Value) {
        let part = Part::bytes(bytes)
            .file_name("paper.pdf")
            .mime_str("application/pdf")
            .unwrap();
        let resp = self
            .client
            .post(format!("{}/api/extract-pdf-text", self.base))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }
}

fn review_body(provider: Value) -> Value {
    json!({
        "pdfText": "We measure the half-life of a novel isotope.",
        "field": "Physics",
        "reviewFocus": "Methodology",
        "paperType": "Original Research",
        "detailedReview": "Yes",
        "outputLanguage": "English",
        "strictnessLevel": 70,
        "additionalRequirements": "Check the error bars.",
        "apiConfig": provider,
    })
}

// ── Review ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn review_paper_returns_cleaned_review() {
    let fake = FakeProvider::start().await;
    let api = Api::plain().await;

    let (status, body) = api
        .post_json(
            "/api/review-paper",
            review_body(json!({
                "provider": "openai",
                "apiKey": "sk-test",
                "apiBase": format!("{}/", fake.base()),
                "apiModel": "gpt-test",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["review"], OPENAI_CLEANED);

    let seen = fake.last();
    assert_eq!(seen.path, "/v1/chat/completions", "trailing slash must not double");
    assert_eq!(seen.headers["authorization"], "Bearer sk-test");
    assert_eq!(seen.body["model"], "gpt-test");
    assert_eq!(seen.body["max_tokens"], 1000);
    assert_eq!(seen.body["temperature"], json!(0.7));

    let prompt = seen.body["messages"][0]["content"].as_str().unwrap();
    assert_eq!(seen.body["messages"][0]["role"], "user");
    assert!(prompt.contains("Physics"));
    assert!(prompt.contains("Methodology"));
    assert!(prompt.contains("70/100"));
    assert!(prompt.contains("Check the error bars."));
    assert!(prompt.contains("half-life of a novel isotope"));
}

#[tokio::test]
async fn review_uses_server_default_provider() {
    let fake = FakeProvider::start().await;
    let config = AssistantConfig::builder()
        .default_provider(ProviderConfig::new(ProviderKind::OpenAi, "server-key").with_base(fake.base()))
        .build()
        .unwrap();
    let api = Api::start(config, None).await;

    let mut body = review_body(Value::Null);
    body.as_object_mut().unwrap().remove("apiConfig");
    let (status, answer) = api.post_json("/api/review-paper", body).await;

    assert_eq!(status, StatusCode::OK, "body: {answer}");
    assert_eq!(fake.last().headers["authorization"], "Bearer server-key");
}

#[tokio::test]
async fn review_without_any_provider_is_400() {
    let api = Api::plain().await;
    let mut body = review_body(Value::Null);
    body.as_object_mut().unwrap().remove("apiConfig");

    let (status, answer) = api.post_json("/api/review-paper", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(answer["error"], "API configuration not found");
    assert!(answer["details"].as_str().unwrap().contains("settings"));
}

#[tokio::test]
async fn upstream_failure_is_502_with_status() {
    let fake = FakeProvider::start().await;
    let api = Api::plain().await;

    let (status, answer) = api
        .post_json(
            "/api/review-paper",
            review_body(json!({
                "provider": "openai",
                "apiKey": "k",
                "apiBase": format!("{}/fail", fake.base()),
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(answer["error"], "Language model request failed");
    let details = answer["details"].as_str().unwrap();
    assert!(details.contains("HTTP 500"), "got: {details}");
    assert!(details.contains("upstream exploded"), "got: {details}");
    assert_eq!(fake.seen().len(), 1, "failed calls must not be retried");
}

#[tokio::test]
async fn missing_completion_field_is_502() {
    let fake = FakeProvider::start().await;
    let api = Api::plain().await;

    let (status, answer) = api
        .post_json(
            "/api/review-paper",
            review_body(json!({
                "provider": "openai",
                "apiKey": "k",
                "apiBase": format!("{}/empty", fake.base()),
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(answer["details"]
        .as_str()
        .unwrap()
        .contains("choices[0].message.content"));
}

#[tokio::test]
async fn unknown_field_label_is_400() {
    let api = Api::plain().await;
    let mut body = review_body(json!({"provider": "openai", "apiKey": "k"}));
    body["field"] = json!("Astrology");

    let (status, answer) = api.post_json("/api/review-paper", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(answer["error"], "Invalid request");
}

#[tokio::test]
async fn untouched_review_form_uses_default_options() {
    let fake = FakeProvider::start().await;
    let api = Api::plain().await;

    // What the form posts when only the field was picked.
    let body = json!({
        "pdfText": "We survey coral bleaching events.",
        "field": "Biology",
        "reviewFocus": "",
        "paperType": "",
        "detailedReview": "",
        "outputLanguage": "English",
        "strictnessLevel": 50,
        "additionalRequirements": "",
        "apiConfig": {"provider": "openai", "apiKey": "k", "apiBase": fake.base()},
    });
    let (status, answer) = api.post_json("/api/review-paper", body).await;
    assert_eq!(status, StatusCode::OK, "body: {answer}");

    let prompt = fake.last().body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(prompt.contains("Paper Type: Original Research"), "got: {prompt}");
}

#[tokio::test]
async fn out_of_range_strictness_is_clamped() {
    let fake = FakeProvider::start().await;
    let api = Api::plain().await;
    let mut body = review_body(json!({"provider": "openai", "apiKey": "k", "apiBase": fake.base()}));
    body["strictnessLevel"] = json!(300);

    let (status, answer) = api.post_json("/api/review-paper", body).await;
    assert_eq!(status, StatusCode::OK, "body: {answer}");
    let prompt = fake.last().body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(prompt.contains("Strictness Level: 100/100"), "got: {prompt}");
}

#[tokio::test]
async fn malformed_json_is_400() {
    let api = Api::plain().await;
    let resp = api
        .client
        .post(format!("{}/api/polish-text", api.base))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Polish ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn polish_through_claude_compatible_provider() {
    let fake = FakeProvider::start().await;
    let api = Api::plain().await;

    let (status, answer) = api
        .post_json(
            "/api/polish-text",
            json!({
                "text": "the result are robust",
                "language": "English",
                "polishLevel": 90,
                "providerConfig": {
                    "provider": "claude",
                    "apiKey": "sk-ant",
                    "apiBase": fake.base(),
                    "apiModel": "",
                },
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "body: {answer}");
    assert_eq!(answer["polishedText"], CLAUDE_ANSWER);

    let seen = fake.last();
    assert_eq!(seen.path, "/v1/messages");
    assert_eq!(seen.headers["x-api-key"], "sk-ant");
    assert_eq!(seen.headers["anthropic-version"], "2023-06-01");
    // A blank model falls back to the provider default.
    assert_eq!(seen.body["model"], "claude-3-opus-20240229");

    let prompt = seen.body["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("Completely rewrite the text"));
    assert!(prompt.contains("the result are robust"));
}

#[tokio::test]
async fn claude_messages_api_shape_is_accepted() {
    let fake = FakeProvider::start().await;
    let api = Api::plain().await;

    let (status, answer) = api
        .post_json(
            "/api/polish-text",
            json!({
                "text": "draft",
                "providerConfig": {
                    "provider": "claude",
                    "apiKey": "k",
                    "apiBase": format!("{}/messages-api", fake.base()),
                },
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "body: {answer}");
    assert_eq!(answer["polishedText"], CLAUDE_ANSWER);
}

#[tokio::test]
async fn blank_polish_text_is_400() {
    let api = Api::plain().await;
    let (status, _) = api
        .post_json(
            "/api/polish-text",
            json!({"text": "   ", "providerConfig": {"provider": "openai", "apiKey": "k"}}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Config & health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn check_api_config_reports_server_default() {
    let api = Api::plain().await;
    let resp = api
        .client
        .get(format!("{}/api/check-api-config", api.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"configured": false}));

    let config = AssistantConfig::builder()
        .default_provider(ProviderConfig::new(ProviderKind::OpenAi, "k"))
        .build()
        .unwrap();
    let api = Api::start(config, None).await;
    let resp = api
        .client
        .get(format!("{}/api/check-api-config", api.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"configured": true}));
}

#[tokio::test]
async fn healthz_answers_ok() {
    let api = Api::plain().await;
    let resp = api
        .client
        .get(format!("{}/healthz", api.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

// ── Upload ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_pdf_upload_is_422() {
    let api = Api::plain().await;
    let (status, answer) = api.upload(b"just some text, not a pdf".to_vec()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(answer["error"], "PDF processing failed");
}

#[tokio::test]
async fn upload_without_file_part_is_400() {
    let api = Api::plain().await;
    let resp = api
        .client
        .post(format!("{}/api/extract-pdf-text", api.base))
        .multipart(Form::new().text("comment", "no file here"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let answer: Value = resp.json().await.unwrap();
    assert_eq!(answer["error"], "File upload failed");
}

#[tokio::test]
async fn oversized_upload_is_400() {
    let config = AssistantConfig::builder()
        .max_upload_bytes(1024)
        .build()
        .unwrap();
    let api = Api::start(config, None).await;
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(10 * 1024, b'0');

    let (status, answer) = api.upload(bytes).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {answer}");
}

#[tokio::test]
async fn pdf_endpoints_without_engine_are_503() {
    let api = Api::plain().await;
    let (status, answer) = api
        .post_json("/api/generate-pdf", json!({"markdown": "# Review"}))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(answer["error"], "PDF engine unavailable");
}

// ── PDF round trips (need libpdfium) ─────────────────────────────────────────

#[tokio::test]
#[ignore = "needs libpdfium"]
async fn generate_pdf_returns_attachment() {
    let engine = common::pdf_engine();
    let api = Api::start(AssistantConfig::default(), Some(engine)).await;

    let resp = api
        .client
        .post(format!("{}/api/generate-pdf", api.base))
        .json(&json!({"markdown": "# Overall Evaluation\n\nA careful study.\n\n- point one\n- point two"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"review.pdf\""
    );
    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"), "not a PDF");
}

#[tokio::test]
#[ignore = "needs libpdfium"]
async fn blank_markdown_is_render_failure() {
    let engine = common::pdf_engine();
    let api = Api::start(AssistantConfig::default(), Some(engine)).await;
    let (status, answer) = api
        .post_json("/api/generate-pdf", json!({"markdown": "  \n "}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(answer["error"], "PDF generation failed");
}

#[tokio::test]
#[ignore = "needs libpdfium"]
async fn rendered_review_extracts_back_to_text() {
    let engine = common::pdf_engine();
    let pdf = engine
        .render("# Findings\n\nThe sample size is adequate.")
        .await
        .unwrap();
    let api = Api::start(AssistantConfig::default(), Some(engine)).await;

    let (status, answer) = api.upload(pdf).await;
    assert_eq!(status, StatusCode::OK, "body: {answer}");
    let text = answer["text"].as_str().unwrap();
    assert!(text.contains("Findings"), "got: {text}");
    assert!(text.contains("sample size"), "got: {text}");
}

#[tokio::test]
#[ignore = "needs libpdfium"]
async fn textless_pdf_is_empty_content() {
    let engine = common::pdf_engine();
    // A lone rule renders to a valid page with no text on it.
    let pdf = engine.render("---").await.unwrap();
    let api = Api::start(AssistantConfig::default(), Some(engine)).await;

    let (status, answer) = api.upload(pdf).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(answer["error"], "PDF file content is empty");
}
