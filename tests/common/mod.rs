//! Common test utilities and fixtures

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use jobmail_tracker::config::Config;
use jobmail_tracker::models::Email;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Marker present only in relevance prompts
pub const RELEVANCE_MARKER: &str = "Do not include anything else";

/// Marker present only in detail prompts
pub const DETAIL_MARKER: &str = "APPLIED/OA/INTERVIEW";

/// Create a test email with default values
pub fn create_test_email(id: &str, from: &str, subject: &str, body: &str) -> Email {
    Email {
        id: id.to_string(),
        from: from.to_string(),
        subject: subject.to_string(),
        date: Utc.with_ymd_and_hms(2025, 5, 20, 10, 15, 0).unwrap(),
        body_text: body.to_string(),
        body_html: String::new(),
        message_id: format!("<{}@mail.example.com>", id),
        folder: "INBOX".to_string(),
    }
}

/// Interview invite, newsletter, online assessment: two relevant, one not
pub fn mixed_inbox() -> Vec<Email> {
    vec![
        create_test_email(
            "1",
            "recruitment@startup.io",
            "Interview Invitation - Frontend Developer",
            "We would like to invite you for an interview for the Frontend Developer position.",
        ),
        create_test_email(
            "2",
            "news@shop.example",
            "Weekly newsletter",
            "Ten deals you cannot miss this week.",
        ),
        create_test_email(
            "3",
            "hr@techcorp.com",
            "邀请您参加在线技术测试",
            "恭喜您通过简历筛选！我们邀请您参加在线测试，请在48小时内完成。",
        ),
    ]
}

/// OpenAI-style completion body with a single choice
pub fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

/// Answer the relevance check for prompts containing `needle`
pub async fn mount_relevance(server: &MockServer, needle: &str, answer: &str, priority: u8) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains(RELEVANCE_MARKER))
        .and(body_string_contains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(answer)))
        .with_priority(priority)
        .mount(server)
        .await;
}

/// Answer the detail extraction for prompts containing `needle`
pub async fn mount_details(server: &MockServer, needle: &str, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains(DETAIL_MARKER))
        .and(body_string_contains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
        .mount(server)
        .await;
}

/// Config pointed at a mock LLM server, with no pause between emails
pub fn config_for_llm(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.llm.api_base = format!("{}/v1", server.uri());
    config.llm.api_key = "sk-test".to_string();
    config.llm.model = "test-model".to_string();
    config.llm.timeout_secs = 5;
    config.analysis.delay_ms = 0;
    config
}

/// Config pointed at a mock mail gateway
pub fn config_for_gateway(server: &MockServer, address: &str) -> Config {
    let mut config = Config::default();
    config.mail.address = address.to_string();
    config.gateway.endpoint = format!("{}/mcp", server.uri());
    config.gateway.timeout_secs = 5;
    config.gateway.login_wait_secs = 0;
    config.resolve_defaults();
    config
}

/// Gateway wire form of an email
pub fn email_json(id: &str, from: &str, subject: &str, date: &str) -> serde_json::Value {
    json!({
        "id": id,
        "from": from,
        "subject": subject,
        "date": date,
        "body_text": "Thanks for applying.",
        "body_html": "<p>Thanks for applying.</p>",
        "message_id": format!("<{}@gateway>", id),
        "folder": "INBOX"
    })
}
