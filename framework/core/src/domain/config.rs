// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) configuring a
// Democrite node:
// - storage backend for records, board state and sequence checkpoints
// - event bus capacity
// - runtime switches (sequence state storage, command nesting depth)
// - default blackboard controller preferences

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::blackboard::template::ControllerOptions;
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "democrite/v1";
pub const KIND: &str = "NodeConfig";

/// Top-level node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemocriteConfig {
    /// API version (must be "democrite/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "NodeConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: DemocriteConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemocriteConfigSpec {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub event_bus: EventBusConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub blackboard: BlackboardConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// PostgreSQL connection string, required for the postgres backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl StorageConfig {
    pub fn to_backend(&self) -> anyhow::Result<StorageBackend> {
        match self.backend {
            StorageBackendKind::InMemory => Ok(StorageBackend::InMemory),
            StorageBackendKind::Postgres => {
                let connection_string = self
                    .database_url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("spec.storage.database_url is required for the postgres backend"))?;
                Ok(StorageBackend::PostgreSQL(PostgresConfig { connection_string }))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    #[serde(default = "default_event_bus_capacity")]
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_bus_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Never persist sequence executor checkpoints
    #[serde(default)]
    pub block_sequence_state_storage: bool,

    /// Maximum nesting of command execution contexts
    #[serde(default = "default_max_command_depth")]
    pub max_command_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            block_sequence_state_storage: false,
            max_command_depth: default_max_command_depth(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlackboardConfig {
    /// Used when neither the issue nor the board template states a preference
    #[serde(default)]
    pub default_controller: ControllerOptions,
}

fn default_event_bus_capacity() -> usize {
    1000
}

fn default_max_command_depth() -> usize {
    16
}

impl Default for DemocriteConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "democrite-node".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: DemocriteConfigSpec::default(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl DemocriteConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. DEMOCRITE_CONFIG_PATH environment variable
    /// 2. ./democrite-config.yaml (working directory)
    /// 3. ~/.democrite/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DEMOCRITE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./democrite-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".democrite").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("DEMOCRITE_STORAGE_BACKEND") {
            match val.to_lowercase().as_str() {
                "in_memory" | "memory" => {
                    tracing::info!("Environment override: DEMOCRITE_STORAGE_BACKEND=in_memory");
                    self.spec.storage.backend = StorageBackendKind::InMemory;
                }
                "postgres" | "postgresql" => {
                    tracing::info!("Environment override: DEMOCRITE_STORAGE_BACKEND=postgres");
                    self.spec.storage.backend = StorageBackendKind::Postgres;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for DEMOCRITE_STORAGE_BACKEND: '{}'. Expected in_memory/postgres. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Some(url) = lookup("DEMOCRITE_DATABASE_URL") {
            tracing::info!("Environment override: DEMOCRITE_DATABASE_URL");
            self.spec.storage.database_url = Some(url);
        }

        if let Some(val) = lookup("DEMOCRITE_BLOCK_SEQUENCE_STATE_STORAGE") {
            match parse_bool(&val) {
                Some(flag) => {
                    tracing::info!("Environment override: DEMOCRITE_BLOCK_SEQUENCE_STATE_STORAGE={}", flag);
                    self.spec.runtime.block_sequence_state_storage = flag;
                }
                None => {
                    tracing::warn!(
                        "Invalid value for DEMOCRITE_BLOCK_SEQUENCE_STATE_STORAGE: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.event_bus.capacity == 0 {
            anyhow::bail!("spec.event_bus.capacity must be greater than zero");
        }

        if self.spec.runtime.max_command_depth == 0 {
            anyhow::bail!("spec.runtime.max_command_depth must be greater than zero");
        }

        self.spec.storage.to_backend()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blackboard::rules::LimitType;

    #[test]
    fn test_default_manifest() {
        let config = DemocriteConfig::default();
        assert_eq!(config.api_version, "democrite/v1");
        assert_eq!(config.kind, "NodeConfig");
        assert_eq!(config.spec.storage.backend, StorageBackendKind::InMemory);
        assert_eq!(config.spec.runtime.max_command_depth, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_spec_sections_are_the_ones_the_node_reads() {
        let value = serde_yaml::to_value(DemocriteConfig::default().spec).unwrap();
        let mut keys: Vec<&str> = value
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(|k| k.as_str())
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["blackboard", "event_bus", "runtime", "storage"]);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
apiVersion: democrite/v1
kind: NodeConfig
metadata:
  name: edge-1
spec:
  storage:
    backend: postgres
    database_url: postgres://localhost/democrite
  blackboard:
    default_controller:
      limit_resolution_preference: keep_newest
"#;
        let config = DemocriteConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.spec.event_bus.capacity, 1000);
        assert_eq!(
            config.spec.blackboard.default_controller.limit_resolution_preference,
            Some(LimitType::KeepNewest)
        );
        assert!(matches!(config.spec.storage.to_backend().unwrap(), StorageBackend::PostgreSQL(_)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = DemocriteConfig::default();

        config.api_version = "wrong/v1".to_string();
        assert!(config.validate().is_err());
        config.api_version = API_VERSION.to_string();

        config.kind = "Other".to_string();
        assert!(config.validate().is_err());
        config.kind = KIND.to_string();

        config.spec.storage.backend = StorageBackendKind::Postgres;
        assert!(config.validate().is_err());
        config.spec.storage.database_url = Some("postgres://localhost/db".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DemocriteConfig::default();
        let env: HashMap<&str, &str> = HashMap::from([
            ("DEMOCRITE_STORAGE_BACKEND", "postgres"),
            ("DEMOCRITE_DATABASE_URL", "postgres://db/democrite"),
            ("DEMOCRITE_BLOCK_SEQUENCE_STATE_STORAGE", "yes"),
        ]);

        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.spec.storage.backend, StorageBackendKind::Postgres);
        assert_eq!(config.spec.storage.database_url.as_deref(), Some("postgres://db/democrite"));
        assert!(config.spec.runtime.block_sequence_state_storage);
    }

    #[test]
    fn test_invalid_env_override_ignored() {
        let mut config = DemocriteConfig::default();
        config.apply_overrides_from(|key| match key {
            "DEMOCRITE_BLOCK_SEQUENCE_STATE_STORAGE" => Some("maybe".to_string()),
            _ => None,
        });
        assert!(!config.spec.runtime.block_sequence_state_storage);
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("democrite-config.yaml");
        let mut config = DemocriteConfig::default();
        config.metadata.name = "file-node".to_string();
        config.spec.runtime.block_sequence_state_storage = true;

        config.to_yaml_file(&path).unwrap();
        let loaded = DemocriteConfig::load_or_default(Some(path)).unwrap();

        assert_eq!(loaded.metadata.name, "file-node");
        assert!(loaded.spec.runtime.block_sequence_state_storage);
    }
}
