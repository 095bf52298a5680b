//! Deployment context: target environment and unit-wide properties

use crate::error::{Error, Result};
use crate::types::Tags;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Environment variable holding the target account
pub const ACCOUNT_VAR: &str = "CDK_ACCOUNT";
/// Environment variable holding the target region
pub const REGION_VAR: &str = "CDK_REGION";

static ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12}$").expect("static regex is valid"));
static REGION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]?)?-[a-z]+-\d$").expect("static regex is valid")
});

/// Account and region a unit is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    /// Resolve an environment from optional inputs.
    ///
    /// Fails if either value is missing or malformed; no graph can be built
    /// without a resolved environment.
    pub fn resolve(account: Option<&str>, region: Option<&str>) -> Result<Self> {
        let account = account
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingEnvironment {
                variable: ACCOUNT_VAR,
            })?;
        let region = region
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingEnvironment {
                variable: REGION_VAR,
            })?;

        if !ACCOUNT_RE.is_match(account) {
            return Err(Error::InvalidEnvironment {
                field: "account",
                value: account.to_string(),
                reason: "expected a 12-digit account id",
            });
        }
        if !REGION_RE.is_match(region) {
            return Err(Error::InvalidEnvironment {
                field: "region",
                value: region.to_string(),
                reason: "expected a region like eu-west-1",
            });
        }

        Ok(Self {
            account: account.to_string(),
            region: region.to_string(),
        })
    }

    /// Partition the region belongs to
    pub fn partition(&self) -> &'static str {
        if self.region.starts_with("cn-") {
            "aws-cn"
        } else if self.region.contains("-gov-") {
            "aws-us-gov"
        } else {
            "aws"
        }
    }
}

/// Unit-wide properties passed to every stack builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackProps {
    pub env: Environment,
    pub tags: Tags,
    pub description: Option<String>,
}

impl StackProps {
    /// Create props for an environment with no tags
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            tags: Tags::new(),
            description: None,
        }
    }

    /// Add a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the template description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_resolve_valid() {
        let env = Environment::resolve(Some("123456789012"), Some("eu-west-1")).unwrap();
        assert_eq!(env.account, "123456789012");
        assert_eq!(env.region, "eu-west-1");
        assert_eq!(env.partition(), "aws");
    }

    #[test]
    fn test_resolve_missing_account() {
        let err = Environment::resolve(None, Some("eu-west-1")).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingEnvironment {
                variable: ACCOUNT_VAR
            }
        ));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_resolve_blank_region() {
        let err = Environment::resolve(Some("123456789012"), Some("  ")).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingEnvironment {
                variable: REGION_VAR
            }
        ));
    }

    #[test]
    fn test_resolve_malformed() {
        assert!(matches!(
            Environment::resolve(Some("12345"), Some("eu-west-1")),
            Err(Error::InvalidEnvironment { field: "account", .. })
        ));
        assert!(matches!(
            Environment::resolve(Some("123456789012"), Some("westeurope")),
            Err(Error::InvalidEnvironment { field: "region", .. })
        ));
    }

    #[test]
    fn test_partitions() {
        let gov = Environment::resolve(Some("123456789012"), Some("us-gov-west-1")).unwrap();
        assert_eq!(gov.partition(), "aws-us-gov");
        let cn = Environment::resolve(Some("123456789012"), Some("cn-north-1")).unwrap();
        assert_eq!(cn.partition(), "aws-cn");
    }

    #[test]
    fn test_props_builder() {
        let env = Environment::resolve(Some("123456789012"), Some("eu-west-1")).unwrap();
        let props = StackProps::new(env).with_tag("app", "tag");
        assert_eq!(props.tags.get("app").map(String::as_str), Some("tag"));
    }
}
