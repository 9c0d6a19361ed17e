use crate::error::AppError;
use serde::Deserialize;
use std::env;

pub const DEFAULT_GREETING: &str = "Hello stranger! This API allow you to evaluate the quality of red wine. Go to the /docs for more details.";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub model_path: String,
    pub greeting: String,
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

impl Config {
    /// Defaults, then an optional `wine-api` config file, then `WINE_API_*` env vars.
    pub fn load() -> Result<Self, AppError> {
        let file = env::var("WINE_API_CONFIG").unwrap_or_else(|_| "wine-api".to_string());
        let builder = Self::builder()?
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("WINE_API")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        Ok(builder.build()?.try_deserialize()?)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("model_path", "model/lr.json")?
            .set_default("greeting", DEFAULT_GREETING)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
