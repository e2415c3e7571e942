//! Configuration types for the runner.
//!
//! All configuration is loaded from environment variables, optionally seeded
//! from a `.env` file. The runner needs to know which game to watch, where
//! to post announcements, and, optionally, which LLM backend writes the
//! turn narrative.

use std::time::Duration;

use turnwatch_core::NameTable;

use crate::error::RunnerError;

/// Default snapshot server.
pub const DEFAULT_SERVER_URL: &str = "https://uncivserver.xyz";

/// Default Telegram Bot API base.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Complete runner configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Game identifier on the snapshot server.
    pub game_id: String,
    /// Snapshot server base URL, without a trailing slash.
    pub server_url: String,
    /// Telegram bot token.
    pub bot_token: String,
    /// Telegram chat that receives the announcements.
    pub chat_id: String,
    /// Telegram Bot API base URL, without a trailing slash.
    pub telegram_api_url: String,
    /// Delay between polls.
    pub check_interval: Duration,
    /// Deadline for each external call.
    pub call_timeout: Duration,
    /// Player-to-handle table for messages.
    pub player_names: NameTable,
    /// Narrative backend. `None` selects the plain-text digest.
    pub llm: Option<LlmBackendConfig>,
    /// Directory overriding the embedded prompt templates.
    pub templates_dir: Option<String>,
}

/// Configuration for a single LLM backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmBackendConfig {
    /// The backend type (openai, anthropic).
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API (different request format).
    Anthropic,
}

impl BackendType {
    /// Parse a backend name, case-insensitively.
    pub fn parse(name: &str) -> Result<Self, RunnerError> {
        match name.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(RunnerError::Config(format!(
                "unknown LLM_BACKEND: {other}"
            ))),
        }
    }
}

const LLM_VARS: [&str; 4] = ["LLM_BACKEND", "LLM_API_URL", "LLM_API_KEY", "LLM_MODEL"];

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `GAME_ID` -- game identifier on the snapshot server
    /// - `BOT_TOKEN` -- Telegram bot token
    /// - `CHAT_ID` -- Telegram chat identifier
    ///
    /// Optional variables:
    /// - `SERVER_URL` -- snapshot server (default `https://uncivserver.xyz`)
    /// - `TELEGRAM_API_URL` -- Bot API base (default `https://api.telegram.org`)
    /// - `CHECK_INTERVAL` -- seconds between polls (default 60)
    /// - `CALL_TIMEOUT_MS` -- per-call deadline in milliseconds (default 15000)
    /// - `PLAYER_NAMES` -- `Civ=@handle` pairs separated by commas
    /// - `LLM_BACKEND`, `LLM_API_URL`, `LLM_API_KEY`, `LLM_MODEL` -- narrative
    ///   backend; all four or none
    /// - `TEMPLATES_DIR` -- directory overriding the embedded prompts
    pub fn from_env() -> Result<Self, RunnerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value
    /// or `None` when it is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RunnerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| RunnerError::Config(format!("missing required env var {name}")))
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let game_id = required("GAME_ID")?;
        let bot_token = required("BOT_TOKEN")?;
        let chat_id = required("CHAT_ID")?;

        let server_url = trim_base(
            optional("SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_owned()),
        );
        let telegram_api_url = trim_base(
            optional("TELEGRAM_API_URL").unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_owned()),
        );

        let check_interval_secs: u64 = optional("CHECK_INTERVAL")
            .unwrap_or_else(|| "60".to_owned())
            .trim()
            .parse()
            .map_err(|e| RunnerError::Config(format!("invalid CHECK_INTERVAL: {e}")))?;
        if check_interval_secs == 0 {
            return Err(RunnerError::Config(
                "invalid CHECK_INTERVAL: must be at least 1 second".to_owned(),
            ));
        }

        let call_timeout_ms: u64 = optional("CALL_TIMEOUT_MS")
            .unwrap_or_else(|| "15000".to_owned())
            .trim()
            .parse()
            .map_err(|e| RunnerError::Config(format!("invalid CALL_TIMEOUT_MS: {e}")))?;
        if call_timeout_ms == 0 {
            return Err(RunnerError::Config(
                "invalid CALL_TIMEOUT_MS: must be positive".to_owned(),
            ));
        }

        let player_names = optional("PLAYER_NAMES")
            .map(|names| NameTable::parse(&names))
            .transpose()?
            .unwrap_or_default();

        let llm = load_backend_config(&optional)?;
        let templates_dir = optional("TEMPLATES_DIR");

        Ok(Self {
            game_id,
            server_url,
            bot_token,
            chat_id,
            telegram_api_url,
            check_interval: Duration::from_secs(check_interval_secs),
            call_timeout: Duration::from_millis(call_timeout_ms),
            player_names,
            llm,
            templates_dir,
        })
    }
}

/// Load the LLM backend settings. Either all of [`LLM_VARS`] are set or
/// none are.
fn load_backend_config<F>(optional: &F) -> Result<Option<LlmBackendConfig>, RunnerError>
where
    F: Fn(&str) -> Option<String>,
{
    let values = LLM_VARS.map(optional);
    match values {
        [None, None, None, None] => Ok(None),
        [Some(backend), Some(api_url), Some(api_key), Some(model)] => Ok(Some(LlmBackendConfig {
            backend_type: BackendType::parse(&backend)?,
            api_url: trim_base(api_url),
            api_key,
            model,
        })),
        partial => {
            let missing: Vec<&str> = LLM_VARS
                .iter()
                .zip(partial.iter())
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| *name)
                .collect();
            Err(RunnerError::Config(format!(
                "incomplete LLM configuration, missing {}",
                missing.join(", ")
            )))
        }
    }
}

fn trim_base(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashMap;

    use turnwatch_core::DisplayNames;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<RunnerConfig, RunnerError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        RunnerConfig::from_lookup(|name| map.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("GAME_ID", "0b6f7a1e-game"),
        ("BOT_TOKEN", "123:abc"),
        ("CHAT_ID", "-100200300"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.game_id, "0b6f7a1e-game");
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.telegram_api_url, DEFAULT_TELEGRAM_API_URL);
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert_eq!(config.call_timeout, Duration::from_millis(15_000));
        assert!(config.player_names.is_empty());
        assert!(config.llm.is_none());
        assert!(config.templates_dir.is_none());
    }

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let err = load(&REQUIRED[..2]).unwrap_err();
        assert!(err.to_string().contains("CHAT_ID"), "{err}");
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("SERVER_URL", "http://localhost:8080/"),
            ("CHECK_INTERVAL", "5"),
            ("CALL_TIMEOUT_MS", "2500"),
            ("PLAYER_NAMES", "Spain=@sanechka,Nok=@unleex"),
            ("TEMPLATES_DIR", "/etc/turnwatch/templates"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.check_interval, Duration::from_secs(5));
        assert_eq!(config.call_timeout, Duration::from_millis(2500));
        assert_eq!(config.player_names.display_name("Nok"), "@unleex");
        assert_eq!(
            config.templates_dir.as_deref(),
            Some("/etc/turnwatch/templates")
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("CHECK_INTERVAL", "0"));
        assert!(matches!(load(&vars), Err(RunnerError::Config(_))));
    }

    #[test]
    fn malformed_player_names_are_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PLAYER_NAMES", "Spain"));
        assert!(matches!(load(&vars), Err(RunnerError::Names(_))));
    }

    #[test]
    fn complete_llm_config_is_loaded() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("LLM_BACKEND", "Anthropic"),
            ("LLM_API_URL", "https://api.anthropic.com/v1"),
            ("LLM_API_KEY", "sk-test"),
            ("LLM_MODEL", "claude-haiku-4-5"),
        ]);
        let llm = load(&vars).unwrap().llm.unwrap();
        assert_eq!(llm.backend_type, BackendType::Anthropic);
        assert_eq!(llm.model, "claude-haiku-4-5");
    }

    #[test]
    fn partial_llm_config_names_the_missing_vars() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("LLM_BACKEND", "openai"), ("LLM_MODEL", "gpt-5-nano")]);
        let err = load(&vars).unwrap_err().to_string();
        assert!(err.contains("LLM_API_URL"), "{err}");
        assert!(err.contains("LLM_API_KEY"), "{err}");
        assert!(!err.contains("LLM_MODEL"), "{err}");
    }

    #[test]
    fn backend_type_parsing() {
        assert_eq!(BackendType::parse("deepseek").unwrap(), BackendType::OpenAi);
        assert_eq!(BackendType::parse("CLAUDE").unwrap(), BackendType::Anthropic);
        assert!(BackendType::parse("gemini").is_err());
    }
}
