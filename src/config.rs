use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LLMConfig,
    pub server: ServerConfig,
    pub exam: ExamConfig,
    pub logging: LoggingConfig,
}

/// Remote model service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Exam flow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExamConfig {
    /// Fixed number of questions per exam session.
    pub num_questions: usize,
    /// TTL for memoized generation results.
    pub cache_ttl_minutes: i64,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            llm: LLMConfig::from_env()?,
            server: ServerConfig::from_env()?,
            exam: ExamConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            llm_api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            llm_model = ?self.llm.model,
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            num_questions = self.exam.num_questions,
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values.
    ///
    /// A missing or placeholder API key is fatal: without a credential no
    /// remote call can succeed, so the application must halt before any UI
    /// is usable.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.is_empty() || self.llm.api_key == "your-api-key" {
            log_validation!(failure, "configuration", error = "LLM_API_KEY is missing or placeholder");
            return Err(anyhow!(
                "LLM_API_KEY is missing or still the placeholder value; set a valid API credential"
            ));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.exam.num_questions == 0 {
            return Err(anyhow!("EXAM_NUM_QUESTIONS must be greater than 0"));
        }

        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.logging.level.to_lowercase().as_str())
        {
            warn!("Invalid log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl LLMConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("LLM_API_KEY").unwrap_or_else(|_| "your-api-key".to_string());
        let base_url = env::var("LLM_BASE_URL").ok();
        let model = env::var("LLM_MODEL").ok();

        Ok(LLMConfig {
            api_key,
            base_url,
            model,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str)
        })?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl ExamConfig {
    fn from_env() -> Result<Self> {
        let num_questions_str =
            env::var("EXAM_NUM_QUESTIONS").unwrap_or_else(|_| "10".to_string());
        let num_questions = num_questions_str.parse::<usize>().map_err(|_| {
            anyhow!(
                "Invalid EXAM_NUM_QUESTIONS value: '{}'. Must be a positive number",
                num_questions_str
            )
        })?;

        let cache_ttl_minutes = env::var("EXAM_CACHE_TTL_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<i64>()
            .unwrap_or(60);

        Ok(ExamConfig {
            num_questions,
            cache_ttl_minutes,
        })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info,exam_grader=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    if data.len() <= 8 {
        "*".repeat(data.len())
    } else {
        format!("{}***{}", &data[..4], &data[data.len() - 4..])
    }
}
