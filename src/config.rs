use anyhow::Context;
use std::time::Duration;

use crate::api_connection::endpoints::{
    DEFAULT_OPENAI_BASE_URL, DEFAULT_USDA_BASE_URL, DEFAULT_VISION_MODEL,
};

#[derive(Clone)]
pub struct VisionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Clone)]
pub struct NutrientDbConfig {
    /// `None` switches every item to the fallback estimator.
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub vision: VisionConfig,
    pub nutrient_db: NutrientDbConfig,
    pub http_timeout: Duration,
}

// Keys stay out of debug output.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("vision_base_url", &self.vision.base_url)
            .field("vision_model", &self.vision.model)
            .field("vision_max_tokens", &self.vision.max_tokens)
            .field("nutrient_db_base_url", &self.nutrient_db.base_url)
            .field("nutrient_db_key_set", &self.nutrient_db.api_key.is_some())
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_key = non_empty(lookup("OPENAI_API_KEY")).context("OPENAI_API_KEY must be set")?;

        let vision = VisionConfig {
            api_key,
            base_url: non_empty(lookup("OPENAI_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
            model: non_empty(lookup("VISION_MODEL")).unwrap_or_else(|| DEFAULT_VISION_MODEL.into()),
            max_tokens: lookup("VISION_MAX_TOKENS")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(500),
        };

        let nutrient_db = NutrientDbConfig {
            api_key: non_empty(lookup("USDA_API_KEY")),
            base_url: non_empty(lookup("USDA_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_USDA_BASE_URL.into()),
        };

        let http_timeout = Duration::from_secs(
            lookup("HTTP_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(30),
        );

        Ok(Self {
            vision,
            nutrient_db,
            http_timeout,
        })
    }
}
