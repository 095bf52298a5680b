//! Unit configuration
//!
//! Loaded from `config.toml` in the config directory (see [`crate::paths`]).
//! Every field has a default, so a missing file or a partial one is fine:
//!
//! ```toml
//! stack_name = "AppStack"
//! variant = "bastion-db"
//!
//! [tags]
//! app = "tag"
//!
//! [naming]
//! mode = "scoped"
//! secret = "shared/database-credentials"
//!
//! [database]
//! removal_policy = "retain"
//! deletion_protection = true
//! ```

use anyhow::{Context, Result};
use cfnkit::{InstanceClass, InstanceSize, PostgresEngineVersion, RetentionDays};
use clap::ValueEnum;
use declarative::{RemovalPolicy, Tags};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Which deployment unit to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Bastion host only
    #[default]
    Bastion,
    /// Bastion host plus a PostgreSQL database it can reach
    BastionDb,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Bastion => write!(f, "bastion"),
            Variant::BastionDb => write!(f, "bastion-db"),
        }
    }
}

/// How physical names are derived from the unit name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingMode {
    /// Bastion names are the same in every unit
    #[default]
    Fixed,
    /// Bastion names carry the unit name
    Scoped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub mode: NamingMode,
    pub instance_profile: Option<String>,
    pub session_log_group: Option<String>,
    pub database_identifier: Option<String>,
    pub secret: Option<String>,
    pub security_group: Option<String>,
    pub key_alias: Option<String>,
}

/// The network layout is fixed, so unknown keys such as a zone count are
/// rejected rather than ignored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BastionConfig {
    pub instance_class: InstanceClass,
    pub instance_size: InstanceSize,
    pub session_log_retention: RetentionDays,
}

impl Default for BastionConfig {
    fn default() -> Self {
        Self {
            instance_class: InstanceClass::T3,
            instance_size: InstanceSize::Micro,
            session_log_retention: RetentionDays::OneWeek,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub username: String,
    pub engine_version: PostgresEngineVersion,
    pub instance_class: InstanceClass,
    pub instance_size: InstanceSize,
    pub allocated_storage_gib: u32,
    pub backup_retention_days: u32,
    pub removal_policy: RemovalPolicy,
    pub deletion_protection: bool,
    pub multi_az: bool,
    pub publicly_accessible: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            username: "postgres".to_string(),
            engine_version: PostgresEngineVersion::V16_4,
            instance_class: InstanceClass::T3,
            instance_size: InstanceSize::Micro,
            allocated_storage_gib: 20,
            backup_retention_days: 7,
            removal_policy: RemovalPolicy::Destroy,
            deletion_protection: false,
            multi_az: false,
            publicly_accessible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub stack_name: String,
    pub variant: Variant,
    pub description: Option<String>,
    pub tags: Tags,
    pub naming: NamingConfig,
    pub bastion: BastionConfig,
    pub database: DatabaseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stack_name: "AppStack".to_string(),
            variant: Variant::default(),
            description: None,
            tags: Tags::from([("app".to_string(), "tag".to_string())]),
            naming: NamingConfig::default(),
            bastion: BastionConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl AppConfig {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        Ok(paths::config_dir()?.join(CONFIG_FILE))
    }

    /// Load the config.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// tried and a missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let path = paths::expand(&path.to_string_lossy());
                Self::load_from(&path)
            }
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    log::debug!("No config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load and parse a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, variant: Option<Variant>, stack_name: Option<&str>) -> Self {
        if let Some(variant) = variant {
            self.variant = variant;
        }
        if let Some(name) = stack_name {
            self.stack_name = name.to_string();
        }
        self
    }
}
