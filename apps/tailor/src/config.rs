use std::time::Duration;

use anyhow::{Context, Result};

use crate::document::SectionLocator;
use crate::llm_client::{
    ModelSelection, ProviderSettings, ANTHROPIC_BASE_URL, GROQ_BASE_URL, OLLAMA_HOST,
    OPENAI_BASE_URL,
};
use crate::tailoring::TailorOptions;

/// Application configuration loaded from environment variables.
/// Every variable is optional; startup fails only on values that do not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_level: String,
    /// Provider (or model) preselected in the UI and used by the CLI.
    pub default_model: ModelSelection,
    pub providers: ProviderSettings,
    pub max_upload_bytes: usize,
    pub max_growth_ratio: f64,
    /// Extra heading labels on top of the built-in allow-lists.
    pub summary_headings: Vec<String>,
    pub skills_headings: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let default_model = or("DEFAULT_MODEL", "groq");
        let default_model = ModelSelection::parse(&default_model).with_context(|| {
            format!("DEFAULT_MODEL '{default_model}' is not a known provider or model")
        })?;

        let providers = ProviderSettings {
            openai_api_key: var("OPENAI_API_KEY"),
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            groq_api_key: var("GROQ_API_KEY"),
            openai_model: or("OPENAI_MODEL", "gpt-3.5-turbo"),
            anthropic_model: or("ANTHROPIC_MODEL", "claude-3-sonnet-20240229"),
            groq_model: or("GROQ_MODEL", "llama3-8b-8192"),
            ollama_model: or("OLLAMA_MODEL", "phi3:mini"),
            openai_base_url: or("OPENAI_BASE_URL", OPENAI_BASE_URL),
            anthropic_base_url: or("ANTHROPIC_BASE_URL", ANTHROPIC_BASE_URL),
            groq_base_url: or("GROQ_BASE_URL", GROQ_BASE_URL),
            ollama_host: or("OLLAMA_HOST", OLLAMA_HOST),
            hosted_timeout: Duration::from_secs(parse_var(&var, "HOSTED_TIMEOUT_SECS", 60)?),
            local_timeout: Duration::from_secs(parse_var(&var, "LOCAL_TIMEOUT_SECS", 120)?),
            ..ProviderSettings::default()
        };

        let max_upload_mb: usize = parse_var(&var, "MAX_UPLOAD_MB", 200)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .with_context(|| format!("MAX_UPLOAD_MB {max_upload_mb} is too large"))?;
        let max_growth_ratio: f64 = parse_var(&var, "MAX_GROWTH_RATIO", 1.5)?;

        Ok(Config {
            port: parse_var(&var, "PORT", 8501)?,
            log_level: or("LOG_LEVEL", "info"),
            default_model,
            providers,
            max_upload_bytes,
            max_growth_ratio,
            summary_headings: split_list(var("SUMMARY_HEADINGS")),
            skills_headings: split_list(var("SKILLS_HEADINGS")),
        })
    }

    pub fn locator(&self) -> SectionLocator {
        SectionLocator::new(&self.summary_headings, &self.skills_headings)
    }

    pub fn tailor_options(&self) -> TailorOptions {
        TailorOptions {
            max_growth_ratio: self.max_growth_ratio,
        }
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|r| {
        r.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
