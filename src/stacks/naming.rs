//! Physical names for a unit's resources

use crate::config::{NamingConfig, NamingMode};

const INSTANCE_PROFILE: &str = "EC2BastionInstanceProfile";
const SESSION_LOG_GROUP: &str = "/ssm/ec2/session";

/// Resolves every physical name from the unit name, mode and overrides
#[derive(Debug, Clone)]
pub struct Naming {
    unit: String,
    config: NamingConfig,
}

impl Naming {
    pub fn new(unit: impl Into<String>, config: NamingConfig) -> Self {
        Self {
            unit: unit.into(),
            config,
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn instance_profile(&self) -> String {
        self.config
            .instance_profile
            .clone()
            .unwrap_or_else(|| match self.config.mode {
                NamingMode::Fixed => INSTANCE_PROFILE.to_string(),
                NamingMode::Scoped => format!("{}-{INSTANCE_PROFILE}", self.unit),
            })
    }

    pub fn session_log_group(&self) -> String {
        self.config
            .session_log_group
            .clone()
            .unwrap_or_else(|| match self.config.mode {
                NamingMode::Fixed => SESSION_LOG_GROUP.to_string(),
                NamingMode::Scoped => format!("{SESSION_LOG_GROUP}/{}", self.unit),
            })
    }

    pub fn database_identifier(&self) -> String {
        self.config
            .database_identifier
            .clone()
            .unwrap_or_else(|| format!("{}-db", kebab(&self.unit)))
    }

    pub fn secret(&self) -> String {
        self.config
            .secret
            .clone()
            .unwrap_or_else(|| format!("{}/database-credentials", self.unit))
    }

    pub fn security_group(&self) -> String {
        self.config
            .security_group
            .clone()
            .unwrap_or_else(|| format!("{}-database-sg", self.unit))
    }

    pub fn key_alias(&self) -> String {
        self.config
            .key_alias
            .clone()
            .unwrap_or_else(|| format!("alias/{}", self.database_identifier()))
    }
}

/// `AppStack` -> `app-stack`, `my_unit 2` -> `my-unit-2`
fn kebab(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = true;
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
            prev_lower = false;
        }
    }
    out.trim_end_matches('-').to_string()
}
