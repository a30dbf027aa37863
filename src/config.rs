// Runtime configuration loaded with the 'config' crate and 'dotenv'

use anyhow::Result;
use chrono::Datelike;
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    pub base_url: String, // Origin that relative listing links are resolved against
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_pages: u32, // Upper bound for a single fetch, whatever the client asks for
    pub page_concurrency: usize,
    pub fetch_retries: u32,
    pub retry_delay_ms: u64,
    pub reference_year: Option<i32>, // Year used for listing age, defaults to the current year
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            // Add default values
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("base_url", crate::parser::DEFAULT_BASE_URL)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("request_timeout_secs", 10)?
            .set_default("max_pages", 5)?
            .set_default("page_concurrency", 1)?
            .set_default("fetch_retries", 0)?
            .set_default("retry_delay_ms", 500)?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_MAX_PAGES)
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        if settings.page_concurrency == 0 {
            anyhow::bail!("page_concurrency must be at least 1");
        }
        Ok(settings)
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year.unwrap_or_else(|| chrono::Local::now().year())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:3000".to_string(),
            base_url: crate::parser::DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 10,
            max_pages: 5,
            page_concurrency: 1,
            fetch_retries: 0,
            retry_delay_ms: 500,
            reference_year: None,
        }
    }
}
