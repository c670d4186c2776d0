use chrono::{DateTime, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TrackerError};

static ENV_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Mailbox provider, used by the gateway to pick a login flow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    Gmail,
    Outlook,
    Yahoo,
    Chinese,
    #[default]
    Custom,
}

impl MailProvider {
    /// Infer the provider from the mailbox address
    pub fn infer(address: &str) -> Self {
        let address = address.to_lowercase();
        let has = |domain: &str| address.contains(domain);

        if has("@gmail.com") || has("@googlemail.com") {
            MailProvider::Gmail
        } else if has("@outlook.com") || has("@hotmail.com") || has("@live.com") {
            MailProvider::Outlook
        } else if has("@yahoo.com") || has("@yahoo.co.") {
            MailProvider::Yahoo
        } else if has("@qq.com") || has("@163.com") || has("@126.com") {
            MailProvider::Chinese
        } else {
            MailProvider::Custom
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MailProvider::Gmail => "gmail",
            MailProvider::Outlook => "outlook",
            MailProvider::Yahoo => "yahoo",
            MailProvider::Chinese => "chinese",
            MailProvider::Custom => "custom",
        }
    }

    /// Folders scanned when none are configured
    pub fn default_folders(&self) -> Vec<String> {
        let folders: &[&str] = match self {
            MailProvider::Gmail => &["INBOX", "[Gmail]/Sent Mail", "[Gmail]/All Mail"],
            MailProvider::Outlook => &["INBOX", "Sent Items"],
            MailProvider::Yahoo => &["INBOX", "Sent"],
            MailProvider::Chinese | MailProvider::Custom => &["INBOX"],
        };
        folders.iter().map(|f| f.to_string()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MailConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub provider: Option<MailProvider>,
    #[serde(default)]
    pub folders: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_login_wait_secs")]
    pub login_wait_secs: u64,
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_gateway_endpoint(),
            api_key: String::new(),
            login_wait_secs: default_login_wait_secs(),
            timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// `YYYY-MM-DD` or RFC 3339; empty means seven days ago
    #[serde(default)]
    pub start: String,
    /// `YYYY-MM-DD` or RFC 3339; empty means now
    #[serde(default)]
    pub end: String,
    #[serde(default = "default_max_emails")]
    pub max_emails: usize,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            start: String::new(),
            end: String::new(),
            max_emails: default_max_emails(),
            keywords: default_keywords(),
        }
    }
}

impl FetchConfig {
    /// Resolve the fetch window relative to `now`
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = parse_date_loose(&self.start).unwrap_or(now - Duration::days(7));
        let end = parse_date_loose(&self.end).unwrap_or(now);
        (start, end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_file")]
    pub file: String,
    #[serde(default)]
    pub statistics_file: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file: default_export_file(),
            statistics_file: None,
        }
    }
}

fn default_gateway_endpoint() -> String {
    "http://localhost:8080/mcp".to_string()
}

fn default_login_wait_secs() -> u64 {
    30
}

fn default_gateway_timeout_secs() -> u64 {
    30
}

fn default_max_emails() -> usize {
    100
}

fn default_keywords() -> Vec<String> {
    [
        "job",
        "interview",
        "offer",
        "application",
        "招聘",
        "面试",
        "职位",
        "工作",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_delay_ms() -> u64 {
    500
}

fn default_deadline_secs() -> u64 {
    300
}

fn default_export_file() -> String {
    "emails.csv".to_string()
}

/// Replace `${VAR}` placeholders with environment values; unset variables stay verbatim
pub fn expand_env_vars(content: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(content, |caps: &regex::Captures| {
            match std::env::var(&caps[1]) {
                Ok(value) if !value.is_empty() => value,
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Parse `YYYY-MM-DD` (midnight UTC) or RFC 3339; anything else is `None`
pub fn parse_date_loose(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            let mut config = Self::default();
            config.resolve_defaults();
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TrackerError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config: Self = toml::from_str(&expand_env_vars(&content))
            .map_err(|e| TrackerError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.resolve_defaults();
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    TrackerError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TrackerError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TrackerError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Fill values derived from the mailbox address
    pub fn resolve_defaults(&mut self) {
        let provider = *self
            .mail
            .provider
            .get_or_insert_with(|| MailProvider::infer(&self.mail.address));

        if self.mail.folders.is_empty() {
            self.mail.folders = provider.default_folders();
        }
    }

    pub fn provider(&self) -> MailProvider {
        self.mail
            .provider
            .unwrap_or_else(|| MailProvider::infer(&self.mail.address))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_emails == 0 {
            return Err(TrackerError::ConfigError(
                "fetch.max_emails must be at least 1".to_string(),
            ));
        }

        for (name, value) in [("fetch.start", &self.fetch.start), ("fetch.end", &self.fetch.end)] {
            if !value.trim().is_empty() && parse_date_loose(value).is_none() {
                return Err(TrackerError::ConfigError(format!(
                    "Invalid {}: '{}'. Use YYYY-MM-DD or RFC 3339",
                    name, value
                )));
            }
        }

        if self.llm.api_base.is_empty() {
            return Err(TrackerError::ConfigError(
                "llm.api_base cannot be empty".to_string(),
            ));
        }
        if self.llm.model.is_empty() {
            return Err(TrackerError::ConfigError(
                "llm.model cannot be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(TrackerError::ConfigError(
                "llm.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(TrackerError::ConfigError(
                "llm.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(TrackerError::ConfigError(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(TrackerError::ConfigError(
                "gateway.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.analysis.deadline_secs == 0 {
            return Err(TrackerError::ConfigError(
                "analysis.deadline_secs must be greater than 0".to_string(),
            ));
        }
        if self.export.file.is_empty() {
            return Err(TrackerError::ConfigError(
                "export.file cannot be empty".to_string(),
            ));
        }

        // `${VAR}` survives expansion only when VAR is unset
        for (name, value) in [
            ("llm.api_key", &self.llm.api_key),
            ("gateway.api_key", &self.gateway.api_key),
        ] {
            if let Some(caps) = ENV_PLACEHOLDER.captures(value) {
                return Err(TrackerError::ConfigError(format!(
                    "{} references unset environment variable {}",
                    name, &caps[1]
                )));
            }
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Checks needed before talking to a real mailbox
    pub fn require_mailbox(&self) -> Result<()> {
        if self.mail.address.trim().is_empty() {
            return Err(TrackerError::ConfigError(
                "mail.address is required".to_string(),
            ));
        }
        if self.gateway.endpoint.is_empty() {
            return Err(TrackerError::ConfigError(
                "gateway.endpoint is required to fetch mail".to_string(),
            ));
        }
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let mut config = Self::default();
        config.mail.address = "you@gmail.com".to_string();
        config.llm.api_key = "${OPENAI_API_KEY}".to_string();
        config.save(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serial_test::serial;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.gateway.endpoint, "http://localhost:8080/mcp");
        assert_eq!(config.gateway.login_wait_secs, 30);
        assert_eq!(config.fetch.max_emails, 100);
        assert!(config.fetch.keywords.contains(&"interview".to_string()));
        assert!(config.fetch.keywords.contains(&"面试".to_string()));
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.analysis.delay_ms, 500);
        assert_eq!(config.analysis.deadline_secs, 300);
        assert_eq!(config.export.file, "emails.csv");
        assert!(config.export.statistics_file.is_none());
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_max_emails_zero() {
        let mut config = Config::default();
        config.fetch.max_emails = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least 1"));
    }

    #[test]
    fn test_config_validation_bad_dates() {
        let mut config = Config::default();
        config.fetch.start = "last tuesday".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid fetch.start"));

        config.fetch.start = "2025-01-01".to_string();
        config.fetch.end = "2025-02-01T00:00:00+08:00".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_llm_limits() {
        let mut config = Config::default();
        config.llm.temperature = 3.5;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("llm.temperature"));

        let mut config = Config::default();
        config.llm.max_tokens = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("max_tokens must be greater than 0"));

        let mut config = Config::default();
        config.llm.model = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_mailbox() {
        let mut config = Config::default();
        assert!(config
            .require_mailbox()
            .unwrap_err()
            .to_string()
            .contains("mail.address is required"));

        config.mail.address = "me@example.com".to_string();
        assert!(config.require_mailbox().is_ok());
    }

    #[test]
    fn test_provider_inference() {
        assert_eq!(MailProvider::infer("Someone@Gmail.com"), MailProvider::Gmail);
        assert_eq!(MailProvider::infer("a@googlemail.com"), MailProvider::Gmail);
        assert_eq!(MailProvider::infer("a@hotmail.com"), MailProvider::Outlook);
        assert_eq!(MailProvider::infer("a@yahoo.co.jp"), MailProvider::Yahoo);
        assert_eq!(MailProvider::infer("a@163.com"), MailProvider::Chinese);
        assert_eq!(MailProvider::infer("a@company.dev"), MailProvider::Custom);
    }

    #[test]
    fn test_resolve_defaults() {
        let mut config = Config::default();
        config.mail.address = "me@gmail.com".to_string();
        config.resolve_defaults();

        assert_eq!(config.mail.provider, Some(MailProvider::Gmail));
        assert_eq!(config.mail.folders.len(), 3);
        assert!(config.mail.folders.contains(&"[Gmail]/All Mail".to_string()));
    }

    #[test]
    fn test_resolve_defaults_only_touches_provider_and_folders() {
        let mut config = Config::default();
        config.mail.address = "me@outlook.com".to_string();
        config.gateway.endpoint = String::new();
        config.resolve_defaults();

        let mail = toml::Value::try_from(&config.mail).unwrap();
        let mut keys: Vec<&str> = mail.as_table().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["address", "folders", "provider"]);
        assert_eq!(config.mail.folders, vec!["INBOX", "Sent Items"]);
        assert!(config.gateway.endpoint.is_empty());
    }

    #[test]
    fn test_explicit_provider_and_folders_kept() {
        let mut config = Config::default();
        config.mail.address = "me@gmail.com".to_string();
        config.mail.provider = Some(MailProvider::Custom);
        config.mail.folders = vec!["Jobs".to_string()];
        config.resolve_defaults();

        assert_eq!(config.provider(), MailProvider::Custom);
        assert_eq!(config.mail.folders, vec!["Jobs"]);
    }

    #[test]
    fn test_parse_date_loose() {
        let date = parse_date_loose("2025-03-01").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());

        let rfc = parse_date_loose("2025-03-01T10:00:00+02:00").unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap());

        assert!(parse_date_loose("").is_none());
        assert!(parse_date_loose("03/01/2025").is_none());
    }

    #[test]
    fn test_fetch_window_defaults() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let (start, end) = FetchConfig::default().window(now);
        assert_eq!(start, now - Duration::days(7));
        assert_eq!(end, now);

        let fetch = FetchConfig {
            start: "2025-06-01".to_string(),
            ..FetchConfig::default()
        };
        let (start, end) = fetch.window(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, now);
    }

    #[test]
    #[serial]
    fn test_expand_env_vars() {
        std::env::set_var("JOBTRACKER_TEST_KEY", "sk-123");
        std::env::remove_var("JOBTRACKER_TEST_UNSET");

        let expanded = expand_env_vars("key = \"${JOBTRACKER_TEST_KEY}\"\nother = \"${JOBTRACKER_TEST_UNSET}\"");
        assert_eq!(
            expanded,
            "key = \"sk-123\"\nother = \"${JOBTRACKER_TEST_UNSET}\""
        );

        std::env::remove_var("JOBTRACKER_TEST_KEY");
    }

    #[tokio::test]
    #[serial]
    async fn test_config_load_expands_environment() {
        std::env::set_var("JOBTRACKER_TEST_LLM_KEY", "sk-from-env");

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();
        let content = r#"
[mail]
address = "me@qq.com"

[llm]
api_key = "${JOBTRACKER_TEST_LLM_KEY}"
model = "deepseek-chat"
"#;
        tokio::fs::write(path, content).await.unwrap();

        let config = Config::load(path).await.unwrap();
        assert_eq!(config.llm.api_key, "sk-from-env");
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.provider(), MailProvider::Chinese);
        assert_eq!(config.mail.folders, vec!["INBOX"]);
        // untouched sections keep their defaults
        assert_eq!(config.fetch.max_emails, 100);

        std::env::remove_var("JOBTRACKER_TEST_LLM_KEY");
    }

    #[tokio::test]
    async fn test_config_load_save_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = Config::default();
        config.mail.address = "me@yahoo.com".to_string();
        config.fetch.max_emails = 25;
        config.save(path).await.unwrap();

        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.mail.address, "me@yahoo.com");
        assert_eq!(loaded.fetch.max_emails, 25);
        assert_eq!(loaded.provider(), MailProvider::Yahoo);
        assert_eq!(loaded.export.file, config.export.file);
    }

    #[tokio::test]
    async fn test_config_load_nonexistent_returns_default() {
        let path = Path::new("/tmp/nonexistent-jobtracker-config-12345.toml");
        let config = Config::load(path).await.unwrap();
        assert_eq!(config.fetch.max_emails, 100);
        assert_eq!(config.mail.folders, vec!["INBOX"]);
    }

    #[tokio::test]
    async fn test_config_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();
        tokio::fs::write(path, "this is not valid toml {[}]").await.unwrap();

        let result = Config::load(path).await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[test]
    fn test_config_validation_unexpanded_api_key() {
        let mut config = Config::default();
        config.llm.api_key = "${JOBTRACKER_TEST_MISSING}".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("llm.api_key"));
        assert!(err.contains("JOBTRACKER_TEST_MISSING"));

        let mut config = Config::default();
        config.gateway.api_key = "Bearer ${GW_TOKEN}".to_string();
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("gateway.api_key references unset environment variable GW_TOKEN"));
    }

    #[tokio::test]
    #[serial]
    async fn test_config_load_rejects_unset_api_key_variable() {
        std::env::remove_var("JOBTRACKER_TEST_UNSET_KEY");

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();
        tokio::fs::write(path, "[llm]\napi_key = \"${JOBTRACKER_TEST_UNSET_KEY}\"\n")
            .await
            .unwrap();

        let result = Config::load(path).await;
        assert!(matches!(
            result,
            Err(TrackerError::ConfigError(ref m)) if m.contains("JOBTRACKER_TEST_UNSET_KEY")
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_config_create_example() {
        let previous = std::env::var("OPENAI_API_KEY").ok();
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        Config::create_example(path).await.unwrap();

        let content = tokio::fs::read_to_string(path).await.unwrap();
        assert!(content.contains("${OPENAI_API_KEY}"));

        std::env::set_var("OPENAI_API_KEY", "sk-example");
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.llm.api_key, "sk-example");

        std::env::remove_var("OPENAI_API_KEY");
        assert!(Config::load(path).await.is_err());

        if let Some(value) = previous {
            std::env::set_var("OPENAI_API_KEY", value);
        }
    }
}
