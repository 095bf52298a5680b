//! Provider naming rules for physical names.
//!
//! The backend matches existing resources by these names, so a bad name is
//! rejected while the graph is built rather than at deploy time.

use declarative::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static INSTANCE_PROFILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_+=,.@-]{1,128}$").expect("static regex is valid"));
static LOG_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[.\-_/#A-Za-z0-9]{1,512}$").expect("static regex is valid"));
static DB_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,62}$").expect("static regex is valid"));
static SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_/+=.@-]{1,512}$").expect("static regex is valid")
});
static KEY_ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^alias/[A-Za-z0-9/_-]{1,250}$").expect("static regex is valid"));

fn invalid(kind: &'static str, name: &str, reason: impl Into<String>) -> Error {
    Error::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.into(),
    }
}

pub fn instance_profile_name(name: &str) -> Result<()> {
    if !INSTANCE_PROFILE.is_match(name) {
        return Err(invalid(
            "instance profile name",
            name,
            "1-128 characters from [A-Za-z0-9+=,.@_-]",
        ));
    }
    Ok(())
}

pub fn log_group_name(name: &str) -> Result<()> {
    if !LOG_GROUP.is_match(name) {
        return Err(invalid(
            "log group name",
            name,
            "1-512 characters from [A-Za-z0-9._/#-]",
        ));
    }
    Ok(())
}

/// RDS instance identifier: a letter, then letters, digits and single hyphens
pub fn db_identifier(name: &str) -> Result<()> {
    const KIND: &str = "database identifier";
    if !DB_IDENTIFIER.is_match(name) {
        return Err(invalid(
            KIND,
            name,
            "1-63 letters, digits or hyphens, starting with a letter",
        ));
    }
    if name.contains("--") {
        return Err(invalid(KIND, name, "must not contain two consecutive hyphens"));
    }
    if name.ends_with('-') {
        return Err(invalid(KIND, name, "must not end with a hyphen"));
    }
    Ok(())
}

pub fn secret_name(name: &str) -> Result<()> {
    if !SECRET.is_match(name) {
        return Err(invalid(
            "secret name",
            name,
            "1-512 characters from [A-Za-z0-9/_+=.@-]",
        ));
    }
    Ok(())
}

pub fn security_group_name(name: &str) -> Result<()> {
    const KIND: &str = "security group name";
    if name.is_empty() || name.len() > 255 {
        return Err(invalid(KIND, name, "must be 1-255 characters"));
    }
    if name.starts_with("sg-") {
        return Err(invalid(KIND, name, "must not start with 'sg-'"));
    }
    if !name.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        return Err(invalid(KIND, name, "must be printable ASCII"));
    }
    Ok(())
}

pub fn key_alias(name: &str) -> Result<()> {
    const KIND: &str = "key alias";
    if !KEY_ALIAS.is_match(name) {
        return Err(invalid(
            KIND,
            name,
            "'alias/' followed by letters, digits, '/', '_' or '-'",
        ));
    }
    if name.starts_with("alias/aws/") {
        return Err(invalid(KIND, name, "the alias/aws/ prefix is reserved"));
    }
    Ok(())
}
