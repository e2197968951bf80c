//! Configuration management
//!
//! This module handles loading and validation of the Strider configuration.
//! Configuration is stored in TOML format at ~/.strider/config.toml.
//!
//! # Configuration Sections
//!
//! - **log_level**: Default tracing filter when `RUST_LOG` is unset
//! - **agent**: Identity, iteration ceiling, temperature and deadlines
//! - **memory**: Ephemeral capacity, durable storage path and auto-flush
//!
//! # Examples
//!
//! ```
//! use strider_engine::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_toml_str(r#"
//! [agent]
//! name = "researcher"
//! description = "Finds things out"
//! max_iterations = 5
//! "#).unwrap();
//!
//! assert_eq!(config.agent.max_iterations, 5);
//! assert_eq!(config.memory.capacity, 100);
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Agent settings
    pub agent: AgentConfig,

    /// Memory settings
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Agent configuration
///
/// Immutable once an agent is built, except that a missing `system_prompt`
/// is derived exactly once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent identifier
    pub name: String,

    /// What the agent is for
    pub description: String,

    /// Iteration ceiling per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Sampling temperature handed to the decision provider (0.0-1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Explicit system prompt; derived from name, description and capabilities if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Deadline for a single capability call in seconds (0 disables)
    #[serde(default = "default_capability_timeout")]
    pub capability_timeout_secs: u64,

    /// Deadline for a single decision in seconds (0 disables)
    #[serde(default = "default_decision_timeout")]
    pub decision_timeout_secs: u64,
}

/// Memory store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Capacity of the ephemeral store
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Backing file of the durable store (supports ~ expansion)
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Auto-flush interval of the durable store in seconds (0 disables)
    #[serde(default)]
    pub auto_flush_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            storage_path: default_storage_path(),
            auto_flush_secs: 0,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_iterations() -> usize {
    10
}

fn default_temperature() -> f64 {
    0.7
}

fn default_capability_timeout() -> u64 {
    120
}

fn default_decision_timeout() -> u64 {
    300
}

fn default_capacity() -> usize {
    100
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("~/.strider/memory.json")
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl AgentConfig {
    /// Create an agent configuration with default limits
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            max_iterations: default_max_iterations(),
            temperature: default_temperature(),
            system_prompt: None,
            capability_timeout_secs: default_capability_timeout(),
            decision_timeout_secs: default_decision_timeout(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_capability_timeout_secs(mut self, secs: u64) -> Self {
        self.capability_timeout_secs = secs;
        self
    }

    pub fn with_decision_timeout_secs(mut self, secs: u64) -> Self {
        self.decision_timeout_secs = secs;
        self
    }

    /// Capability deadline, `None` when disabled
    pub fn capability_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.capability_timeout_secs)
    }

    /// Decision deadline, `None` when disabled
    pub fn decision_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.decision_timeout_secs)
    }

    /// Validate field ranges
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if:
    /// - name or description is blank
    /// - max_iterations is zero
    /// - temperature is outside 0.0-1.0
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Config("agent name must not be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(EngineError::Config(
                "agent description must not be empty".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(EngineError::Config(
                "max_iterations must be a positive integer".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(EngineError::Config(
                "temperature must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

impl MemoryConfig {
    /// Auto-flush interval, `None` when disabled
    pub fn auto_flush_interval(&self) -> Option<Duration> {
        non_zero_secs(self.auto_flush_secs)
    }
}

impl RuntimeConfig {
    /// Build a configuration around an agent config with default memory settings
    pub fn new(agent: AgentConfig) -> Self {
        Self {
            log_level: default_log_level(),
            agent,
            memory: MemoryConfig::default(),
        }
    }

    /// Load configuration from the default location, if present
    ///
    /// Returns `Ok(None)` when no configuration file exists.
    pub fn load_or_default() -> Result<Option<Self>, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: RuntimeConfig = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.strider/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".strider").join("config.toml"))
    }

    /// Validate fields and expand paths
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            )));
        }

        self.agent.validate()?;

        if self.memory.capacity == 0 {
            return Err(EngineError::Config(
                "memory capacity must be a positive integer".to_string(),
            ));
        }

        self.memory.storage_path = expand_path(&self.memory.storage_path)?;

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
