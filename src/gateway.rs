//! Mail sources: the JSON-RPC mail gateway and the built-in sample set
//!
//! The gateway speaks JSON-RPC 2.0 over HTTP POST with two methods:
//! `email.login` starts an interactive login and returns a session, and
//! `email.fetch` returns the messages matching a query.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::{Config, MailProvider};
use crate::error::{Result, TrackerError};
use crate::models::Email;

/// What to fetch from the mailbox
#[derive(Debug, Clone, PartialEq)]
pub struct EmailQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_emails: usize,
    pub folders: Vec<String>,
    pub keywords: Vec<String>,
}

impl EmailQuery {
    /// Build the query from the fetch and mail sections, resolving the window against `now`
    pub fn from_config(config: &Config, now: DateTime<Utc>) -> Self {
        let (start, end) = config.fetch.window(now);
        Self {
            start,
            end,
            max_emails: config.fetch.max_emails,
            folders: config.mail.folders.clone(),
            keywords: config.fetch.keywords.clone(),
        }
    }
}

/// Anything that can deliver the messages to analyze
#[async_trait]
pub trait MailSource: Send + Sync {
    async fn fetch(&self, query: &EmailQuery) -> Result<Vec<Email>>;
}

/// Interactive login session handed back by `email.login`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct LoginSession {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub login_url: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl LoginSession {
    /// The user must finish login in a browser before fetching
    pub fn needs_browser(&self) -> bool {
        !self.login_url.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// JSON-RPC client for the mail gateway
pub struct GatewayClient {
    client: Client,
    endpoint: String,
    api_key: String,
    provider: MailProvider,
    address: String,
}

impl GatewayClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.gateway.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.gateway.endpoint.clone(),
            api_key: config.gateway.api_key.clone(),
            provider: config.provider(),
            address: config.mail.address.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start the mailbox login flow
    pub async fn login(&self) -> Result<LoginSession> {
        let params = json!({
            "provider": self.provider.as_str(),
            "email": self.address,
        });

        let session: LoginSession = self
            .call("email.login", "login", params)
            .await
            .map_err(|e| match e {
                TrackerError::GatewayError { code, message } => {
                    TrackerError::AuthError(format!("{} (code {})", message, code))
                }
                other => other,
            })?;

        info!(
            "Login session {} for {}: {}",
            session.session_id, self.address, session.status
        );
        Ok(session)
    }

    /// Fetch the messages matching `query`
    pub async fn fetch_emails(&self, query: &EmailQuery) -> Result<Vec<Email>> {
        let params = json!({
            "provider": self.provider.as_str(),
            "email": self.address,
            "start_date": query.start.to_rfc3339(),
            "end_date": query.end.to_rfc3339(),
            "max_emails": query.max_emails,
            "folders": query.folders,
            "keywords": query.keywords,
        });

        let emails: Vec<Email> = self.call("email.fetch", "fetch", params).await?;
        info!(
            "Fetched {} emails between {} and {}",
            emails.len(),
            query.start.format("%Y-%m-%d"),
            query.end.format("%Y-%m-%d")
        );
        Ok(emails)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        id_prefix: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: format!("{}_{}", id_prefix, uuid::Uuid::new_v4().simple()),
            method,
            params,
        };
        debug!("Gateway call {} ({})", method, request.id);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<body read error: {}>", e));
            return Err(TrackerError::GatewayHttpError {
                status: status.as_u16(),
                body,
            });
        }

        let rpc: RpcResponse = response.json().await?;
        if let Some(error) = rpc.error {
            return Err(TrackerError::GatewayError {
                code: error.code,
                message: error.message,
            });
        }

        let result = rpc.result.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl MailSource for GatewayClient {
    async fn fetch(&self, query: &EmailQuery) -> Result<Vec<Email>> {
        self.fetch_emails(query).await
    }
}

/// Three canned messages for dry runs without a mailbox
#[derive(Debug, Clone, Default)]
pub struct SampleMailSource;

impl SampleMailSource {
    pub fn emails(now: DateTime<Utc>) -> Vec<Email> {
        let sample = |id: &str, from: &str, subject: &str, days_ago: i64, body: &str| Email {
            id: id.to_string(),
            from: from.to_string(),
            subject: subject.to_string(),
            date: now - Duration::days(days_ago),
            body_text: body.to_string(),
            body_html: format!("<p>{}</p>", body),
            message_id: String::new(),
            folder: "INBOX".to_string(),
        };

        vec![
            sample(
                "1",
                "noreply@company.com",
                "感谢您投递简历 - 软件工程师职位",
                1,
                "感谢您投递我们公司软件工程师职位的简历。我们已收到您的申请，将在3-5个工作日内回复。",
            ),
            sample(
                "2",
                "hr@techcorp.com",
                "邀请您参加在线技术测试",
                3,
                "恭喜您通过简历筛选！我们邀请您参加在线技术测试，请在48小时内完成。",
            ),
            sample(
                "3",
                "recruitment@startup.io",
                "Interview Invitation - Frontend Developer Position",
                5,
                "We would like to invite you for an interview for the Frontend Developer position. Please confirm your availability.",
            ),
        ]
    }
}

#[async_trait]
impl MailSource for SampleMailSource {
    async fn fetch(&self, query: &EmailQuery) -> Result<Vec<Email>> {
        let mut emails = Self::emails(Utc::now());
        emails.truncate(query.max_emails);
        Ok(emails)
    }
}
