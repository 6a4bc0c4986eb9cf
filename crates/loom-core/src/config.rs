use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{runtime_dir, Result};

/// Layered TOML configuration for the engine's caps, policy, memory, and
/// index sections, mirroring `deepseek_core::AppConfig`: `ensure`/`load`/
/// `save` against `<workspace>/.loom/config.toml`, every section
/// `#[serde(default)]` so a config written by an older version keeps
/// loading after fields are added.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub caps: CapsConfig,
    pub policy: PolicyConfig,
    pub memory: MemoryConfig,
    pub index: IndexConfig,
}

impl AppConfig {
    pub fn config_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("config.toml")
    }

    pub fn load(workspace: &Path) -> Result<Self> {
        let path = Self::config_path(workspace);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn ensure(workspace: &Path) -> Result<Self> {
        let path = Self::config_path(workspace);
        if path.exists() {
            return Self::load(workspace);
        }
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        let cfg = Self::default();
        cfg.save(workspace)?;
        Ok(cfg)
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::config_path(workspace);
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Resource caps from §5.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsConfig {
    pub max_file_size: u64,
    pub max_lines_per_read: usize,
    pub max_directory_listing_files: usize,
    pub max_listing_output_chars: usize,
    pub max_directory_listing_depth: usize,
    pub max_iterations: usize,
    pub max_context_messages: usize,
    pub llm_deadline_seconds: u64,
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1_048_576,
            max_lines_per_read: 500,
            max_directory_listing_files: 1000,
            max_listing_output_chars: 100_000,
            max_directory_listing_depth: 10,
            max_iterations: 15,
            max_context_messages: 50,
            llm_deadline_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub shell_enabled: bool,
    pub allowlist: Vec<String>,
    pub denied_command_prefixes: Vec<String>,
    pub redact_patterns: Vec<String>,
    pub sandbox_mode: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            shell_enabled: true,
            allowlist: vec![],
            denied_command_prefixes: vec![
                "rm -rf /".to_string(),
                "mkfs".to_string(),
                "dd".to_string(),
                "shutdown".to_string(),
                "reboot".to_string(),
            ],
            redact_patterns: vec![
                "(?i)(api[_-]?key|secret[_-]?key|password|token)\\s*[:=]\\s*['\"]?[A-Za-z0-9_\\-]{8,}['\"]?".to_string(),
                "(?i)bearer\\s+[A-Za-z0-9_\\-\\.]{10,}".to_string(),
            ],
            sandbox_mode: "workspace".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub sqlite_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: ".loom/memory.sqlite3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub enabled: bool,
    pub engine: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: "walk".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = AppConfig::default();
        let raw = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: AppConfig = toml::from_str(&raw).expect("deserialize");
        assert_eq!(parsed.caps.max_iterations, cfg.caps.max_iterations);
    }

    #[test]
    fn ensure_creates_and_then_loads_same_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = AppConfig::ensure(dir.path()).expect("ensure");
        assert!(AppConfig::config_path(dir.path()).exists());
        let reloaded = AppConfig::load(dir.path()).expect("load");
        assert_eq!(reloaded.caps.max_file_size, cfg.caps.max_file_size);
    }
}
