// Configuration module for neuromap
// Reads from environment variables with sensible defaults

use std::env;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Directory names never descended into while scanning.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".ai",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    "dist",
    "build",
];

/// File name of the persisted overlay inside the metadata directory.
pub const OVERLAY_FILE_NAME: &str = "neuro_brain.json";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory names skipped during scans (defaults + NEUROMAP_EXCLUDE_DIRS)
    pub excluded_dirs: Vec<String>,

    /// Metadata directory under the project root (NEUROMAP_METADATA_DIR)
    pub metadata_dir: String,

    /// Files above this size are not parsed (NEUROMAP_MAX_FILE_MB)
    pub max_file_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            excluded_dirs: DEFAULT_EXCLUDED_DIRS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            metadata_dir: ".ai".to_string(),
            max_file_mb: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(val) = env::var("NEUROMAP_EXCLUDE_DIRS") {
            config.excluded_dirs.extend(parse_dir_list(&val));
        }

        if let Ok(val) = env::var("NEUROMAP_METADATA_DIR") {
            let trimmed = val.trim();
            if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
                tracing::warn!(
                    value = %val,
                    default = %config.metadata_dir,
                    "invalid NEUROMAP_METADATA_DIR, using default"
                );
            } else {
                config.metadata_dir = trimmed.to_string();
            }
        }

        if let Ok(val) = env::var("NEUROMAP_MAX_FILE_MB") {
            if let Ok(parsed) = val.parse() {
                config.max_file_mb = parsed;
            } else {
                tracing::warn!(
                    value = %val,
                    default = config.max_file_mb,
                    "invalid NEUROMAP_MAX_FILE_MB, using default"
                );
            }
        }

        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}

fn parse_dir_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.metadata_dir, ".ai");
        assert_eq!(config.max_file_mb, 10);
        assert!(config.excluded_dirs.iter().any(|d| d == "__pycache__"));
        assert_eq!(config.excluded_dirs.len(), DEFAULT_EXCLUDED_DIRS.len());
    }

    #[test]
    fn dir_list_skips_blanks() {
        assert_eq!(
            parse_dir_list(" target, ,.tox,"),
            vec!["target".to_string(), ".tox".to_string()]
        );
    }
}
