//! Bootstrap: resolve the environment, then build exactly one unit

use declarative::{Environment, Error, Result, StackProps};
use regex::Regex;
use std::sync::LazyLock;

use crate::config::AppConfig;
use crate::stacks::{self, Deployment};

static STACK_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("static regex is valid"));

/// Build the configured unit for `account` / `region`.
///
/// The environment is resolved before anything is declared, so a missing
/// account or region fails with an empty graph.
pub fn bootstrap(
    account: Option<&str>,
    region: Option<&str>,
    config: &AppConfig,
) -> Result<Deployment> {
    let env = Environment::resolve(account, region)?;
    log::debug!("resolved environment {}/{}", env.account, env.region);

    if !STACK_NAME_RE.is_match(&config.stack_name) {
        return Err(Error::InvalidName {
            kind: "stack name",
            name: config.stack_name.clone(),
            reason: "must start with a letter and contain only letters, digits and hyphens (max 128)"
                .to_string(),
        });
    }

    let mut props = StackProps::new(env);
    props.tags.extend(config.tags.clone());
    props = props.with_description(
        config
            .description
            .clone()
            .unwrap_or_else(|| format!("{} deployment unit {}", config.variant, config.stack_name)),
    );

    stacks::build(props, config)
}
