use std::path::PathBuf;

use crate::error::CitywatchError;

pub const DEFAULT_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_INPUT_PATH: &str = "data/london_crime_news.json";
pub const DEFAULT_OUTPUT_PATH: &str = "outputs/london_crime_news_labeled.json";

/// Run configuration, loaded once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    // AI provider
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub model: String,

    // Labeling
    pub max_concurrency: usize,
    pub max_retries: u32,

    // Files
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self, CitywatchError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CitywatchError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = var("OPENAI_API_KEY")
            .ok_or_else(|| CitywatchError::MissingEnv("OPENAI_API_KEY".into()))?;

        Ok(Self {
            openai_api_key,
            openai_base_url: var("OPENAI_BASE_URL"),
            model: var("MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_concurrency: positive(
                "MAX_CONCURRENCY",
                var("MAX_CONCURRENCY"),
                DEFAULT_MAX_CONCURRENCY,
            )?,
            max_retries: positive("MAX_RETRIES", var("MAX_RETRIES"), DEFAULT_MAX_RETRIES)?,
            input_path: var("INPUT_PATH")
                .unwrap_or_else(|| DEFAULT_INPUT_PATH.to_string())
                .into(),
            output_path: var("OUTPUT_PATH")
                .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string())
                .into(),
        })
    }

    /// Log the configuration without leaking the API key.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let prefix: String = val.chars().take(5).collect();
            format!("{}...({} chars)", prefix, val.chars().count())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  OPENAI_API_KEY: {}", preview(&self.openai_api_key));
        tracing::info!(
            "  OPENAI_BASE_URL: {}",
            self.openai_base_url.as_deref().unwrap_or("<default>")
        );
        tracing::info!("  MODEL: {}", self.model);
        tracing::info!("  MAX_CONCURRENCY: {}", self.max_concurrency);
        tracing::info!("  MAX_RETRIES: {}", self.max_retries);
        tracing::info!("  INPUT_PATH: {}", self.input_path.display());
        tracing::info!("  OUTPUT_PATH: {}", self.output_path.display());
    }
}

fn positive<T>(key: &str, value: Option<String>, default: T) -> Result<T, CitywatchError>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(n) if n >= T::from(1) => Ok(n),
        _ => Err(CitywatchError::InvalidEnv {
            key: key.to_string(),
            value: raw,
            expected: "a positive integer",
        }),
    }
}
