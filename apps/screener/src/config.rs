use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::notify::SENDGRID_API_URL;
use crate::pipeline::consumer::DEFAULT_RETRY_INTERVAL;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or an optional one is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub model_path: PathBuf,
    pub sendgrid_api_key: String,
    pub sendgrid_api_url: String,
    pub notify_from_email: String,
    pub stream_key: String,
    pub consumer_retry: Duration,
    pub consumer_autostart: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let default_retry_secs = DEFAULT_RETRY_INTERVAL.as_secs().to_string();

        Ok(Config {
            redis_url: require("REDIS_URL")?,
            model_path: PathBuf::from(require("MODEL_PATH")?),
            sendgrid_api_key: require("SENDGRID_API_KEY")?,
            sendgrid_api_url: or_default("SENDGRID_API_URL", SENDGRID_API_URL),
            notify_from_email: or_default("NOTIFY_FROM_EMAIL", "screening@fairai.local"),
            stream_key: or_default("RESUME_STREAM_KEY", "resumes_stream"),
            consumer_retry: Duration::from_secs(
                or_default("CONSUMER_RETRY_SECS", &default_retry_secs)
                    .parse::<u64>()
                    .context("CONSUMER_RETRY_SECS must be a whole number of seconds")?,
            ),
            consumer_autostart: parse_bool(&or_default("CONSUMER_AUTOSTART", "true"))
                .context("CONSUMER_AUTOSTART must be true or false")?,
            port: or_default("PORT", "8000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: or_default("RUST_LOG", "info"),
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("'{other}' is not a boolean"),
    }
}
