use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PAGE_SIZE: usize = 15;
pub const DEFAULT_LOADING_THRESHOLD: usize = 5;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the catalog service.
    #[serde(default = "ApiConfig::default_base_url")]
    pub base_url: String,
    /// Collection name in the page endpoint, e.g. "cats" in /api/cats.
    #[serde(default = "ApiConfig::default_collection")]
    pub collection: String,
    /// Singular form used by the asset endpoint, e.g. "cat" in /cat/{id}.
    #[serde(default = "ApiConfig::default_singular")]
    pub singular: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Items fetched per page.
    #[serde(default = "CacheConfig::default_page_size")]
    pub page_size: usize,
    /// Request the next page when the cursor is this close to the end.
    #[serde(default = "CacheConfig::default_loading_threshold")]
    pub loading_threshold: usize,
    /// Pin the memory budget instead of querying the OS (bytes).
    #[serde(default)]
    pub fixed_budget_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Enable logging to file
    #[serde(default = "LoggingConfig::default_enabled")]
    pub enabled: bool,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// Enable logging to console
    #[serde(default)]
    pub log_to_console: bool,
    /// Append to existing log file
    #[serde(default = "LoggingConfig::default_append_to_file")]
    pub append_to_file: bool,
    /// Enable log rotation
    #[serde(default = "LoggingConfig::default_rotate_logs")]
    pub rotate_logs: bool,
    /// Maximum log file size in MB before rotation
    #[serde(default = "LoggingConfig::default_rotation_size_mb")]
    pub rotation_size_mb: u64,
    /// Number of log files to keep when rotating
    #[serde(default = "LoggingConfig::default_keep_log_files")]
    pub keep_log_files: u32,
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> color_eyre::Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let default_config = Config::default();
            let toml_string = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_string)?;

            eprintln!("Created default config file at: {}", config_path.display());

            return Ok(default_config);
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn generate_default(path: PathBuf) -> color_eyre::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(&Config::default())?;
        std::fs::write(&path, &toml_string)?;
        eprintln!("Wrote default config to: {}", path.display());
        Ok(())
    }

    pub fn default_path() -> color_eyre::Result<PathBuf> {
        let home = std::env::var("HOME")?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("catfeed")
            .join("config.toml"))
    }
}

impl ApiConfig {
    fn default_base_url() -> String {
        "https://cataas.com".to_string()
    }

    fn default_collection() -> String {
        "cats".to_string()
    }

    fn default_singular() -> String {
        "cat".to_string()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            collection: Self::default_collection(),
            singular: Self::default_singular(),
        }
    }
}

impl CacheConfig {
    fn default_page_size() -> usize {
        DEFAULT_PAGE_SIZE
    }

    fn default_loading_threshold() -> usize {
        DEFAULT_LOADING_THRESHOLD
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: Self::default_page_size(),
            loading_threshold: Self::default_loading_threshold(),
            fixed_budget_bytes: None,
        }
    }
}

impl LoggingConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_level() -> String {
        "info".to_string()
    }

    fn default_append_to_file() -> bool {
        true
    }

    fn default_rotate_logs() -> bool {
        true
    }

    fn default_rotation_size_mb() -> u64 {
        10
    }

    fn default_keep_log_files() -> u32 {
        5
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            level: Self::default_level(),
            log_to_console: false,
            append_to_file: Self::default_append_to_file(),
            rotate_logs: Self::default_rotate_logs(),
            rotation_size_mb: Self::default_rotation_size_mb(),
            keep_log_files: Self::default_keep_log_files(),
        }
    }
}
