use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::llm::{LLMConfig, LLMProvider};

/// Configuration for Planogram Vision
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vision / chat model settings
    pub llm: LLMConfig,

    /// Frame sampling settings
    pub sampling: SamplingConfig,

    /// Shopping search settings
    pub shopping: ShoppingConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Analyze every Nth decoded frame
    pub frame_interval: u64,

    /// JPEG quality for frames sent to the vision model (1-100)
    pub jpeg_quality: u8,

    /// Upper bound for a single vision call (seconds)
    pub vision_timeout_seconds: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            frame_interval: 23,
            jpeg_quality: 85,
            vision_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShoppingConfig {
    /// SerpAPI key
    pub api_key: Option<String>,

    /// Search endpoint
    pub endpoint: String,

    /// Country code (`gl`)
    pub country: String,

    /// Interface language (`hl`)
    pub language: String,

    /// Results returned when the query sets no limit
    pub default_limit: usize,

    /// Symbol prefixed to prices in the HTML output
    pub currency_symbol: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ShoppingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://serpapi.com/search.json".to_string(),
            country: "in".to_string(),
            language: "en".to_string(),
            default_limit: 5,
            currency_symbol: "₹".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Log level
    pub log_level: String,

    /// Log the accuracy evaluation after each analysis
    pub run_evaluation: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            run_evaluation: true,
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, else the environment
    pub fn load() -> Result<Self> {
        Self::load_from(&[
            "planogram-vision.toml",
            "config/planogram-vision.toml",
            "/etc/planogram-vision/config.toml",
        ])
    }

    /// A file that exists but does not parse is an error, not a fallback
    pub fn load_from<P: AsRef<Path>>(config_paths: &[P]) -> Result<Self> {
        for path in config_paths {
            let path = path.as_ref();
            if let Ok(config_str) = std::fs::read_to_string(path) {
                let config = toml::from_str::<Config>(&config_str)
                    .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
                tracing::info!("📄 Loaded configuration from: {}", path.display());
                return Ok(config.with_env_overrides());
            }
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = var("AZURE_OPENAI_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }

        if let Some(deployment) = var("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.llm.model = deployment;
        }

        if let Some(version) = var("AZURE_OPENAI_API_VERSION") {
            self.llm.api_version = Some(version);
        }

        if let Some(api_key) = var("AZURE_OPENAI_API_KEY") {
            self.llm.api_key = Some(api_key);
        }

        if let Some(api_key) = var("SERPAPI_API_KEY") {
            self.shopping.api_key = Some(api_key);
        }

        if let Some(interval) = var("PLANOGRAM_FRAME_INTERVAL") {
            match interval.parse() {
                Ok(interval) => self.sampling.frame_interval = interval,
                Err(_) => tracing::warn!("Ignoring invalid PLANOGRAM_FRAME_INTERVAL: {}", interval),
            }
        }

        if let Some(log_level) = var("PLANOGRAM_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sampling.frame_interval == 0 {
            return Err(anyhow!("frame_interval must be greater than 0"));
        }

        if !(1..=100).contains(&self.sampling.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be between 1 and 100"));
        }

        if self.sampling.vision_timeout_seconds == 0 {
            return Err(anyhow!("vision_timeout_seconds must be greater than 0"));
        }

        if self.shopping.default_limit == 0 {
            return Err(anyhow!("default_limit must be greater than 0"));
        }

        if self.llm.provider == LLMProvider::AzureOpenAI && self.llm.api_version.is_none() {
            return Err(anyhow!("api_version required for Azure OpenAI"));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Planogram Vision Configuration:\n\
            - LLM Provider: {:?}\n\
            - Model/Deployment: {}\n\
            - LLM Credentials: {}\n\
            - Frame Interval: {}\n\
            - JPEG Quality: {}\n\
            - Vision Timeout: {}s\n\
            - Shopping Region: {}/{}\n\
            - Shopping API Key: {}\n\
            - Result Limit: {}\n\
            - Prompt Directory: {}",
            self.llm.provider,
            self.llm.model,
            if self.llm.api_key.is_some() { "configured" } else { "missing" },
            self.sampling.frame_interval,
            self.sampling.jpeg_quality,
            self.sampling.vision_timeout_seconds,
            self.shopping.country,
            self.shopping.language,
            if self.shopping.api_key.is_some() { "configured" } else { "missing" },
            self.shopping.default_limit,
            self.llm
                .prompts
                .prompt_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "built-in".to_string()),
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_frame_interval(mut self, interval: u64) -> Self {
        self.config.sampling.frame_interval = interval;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.config.sampling.jpeg_quality = quality;
        self
    }

    pub fn with_llm_provider(mut self, provider: LLMProvider) -> Self {
        self.config.llm.provider = provider;
        self
    }

    pub fn with_llm_endpoint(mut self, endpoint: String) -> Self {
        self.config.llm.endpoint = Some(endpoint);
        self
    }

    pub fn with_llm_api_key(mut self, api_key: String) -> Self {
        self.config.llm.api_key = Some(api_key);
        self
    }

    pub fn with_shopping_api_key(mut self, api_key: String) -> Self {
        self.config.shopping.api_key = Some(api_key);
        self
    }

    pub fn with_prompt_dir(mut self, dir: PathBuf) -> Self {
        self.config.llm.prompts.prompt_dir = Some(dir);
        self
    }

    pub fn enable_evaluation(mut self, enable: bool) -> Self {
        self.config.output.run_evaluation = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
