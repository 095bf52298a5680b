//! Core types for declaration graphs

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// Tags applied to every taggable resource of a unit
pub type Tags = BTreeMap<String, String>;

/// What the backend does with a resource when the unit is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Delete the resource with the unit
    Destroy,
    /// Keep the resource after the unit is gone
    Retain,
    /// Take a final snapshot, then delete
    Snapshot,
}

impl RemovalPolicy {
    /// Value for `DeletionPolicy` / `UpdateReplacePolicy`
    pub fn deletion_policy(&self) -> &'static str {
        match self {
            Self::Destroy => "Delete",
            Self::Retain => "Retain",
            Self::Snapshot => "Snapshot",
        }
    }

    /// Whether the resource is removed on teardown
    pub fn destroys(&self) -> bool {
        matches!(self, Self::Destroy | Self::Snapshot)
    }

    /// Policy for a resource type that cannot be snapshotted
    ///
    /// `Snapshot` becomes `Retain`, the others are kept.
    pub fn without_snapshot(self) -> Self {
        match self {
            Self::Snapshot => Self::Retain,
            other => other,
        }
    }
}

/// Reference to a declaration already added to a graph
///
/// Handles are only handed out by the graph, so holding one proves the
/// target was declared earlier in the same pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    logical_id: String,
}

impl Handle {
    pub(crate) fn new(logical_id: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
        }
    }

    /// Logical id of the referenced declaration
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// `{"Ref": id}`
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.logical_id })
    }

    /// `{"Fn::GetAtt": [id, attr]}`
    pub fn attr(&self, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [self.logical_id, attribute] })
    }
}

/// Pseudo parameters the backend always provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    AccountId,
    Region,
    Partition,
    StackName,
    UrlSuffix,
}

impl Pseudo {
    /// Name as written in a template
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountId => "AWS::AccountId",
            Self::Region => "AWS::Region",
            Self::Partition => "AWS::Partition",
            Self::StackName => "AWS::StackName",
            Self::UrlSuffix => "AWS::URLSuffix",
        }
    }

    /// `{"Ref": "AWS::..."}`
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.name() })
    }
}

/// Intrinsic function builders
pub mod intrinsic {
    use serde_json::{Value, json};

    /// `{"Fn::Join": [sep, parts]}`
    pub fn join(separator: &str, parts: Vec<Value>) -> Value {
        json!({ "Fn::Join": [separator, parts] })
    }

    /// `{"Fn::Select": [index, list]}`
    pub fn select(index: usize, list: Value) -> Value {
        json!({ "Fn::Select": [index.to_string(), list] })
    }

    /// `{"Fn::GetAZs": ""}` - availability zones of the deploying region
    pub fn get_azs() -> Value {
        json!({ "Fn::GetAZs": "" })
    }

    /// `{"Fn::Sub": template}`
    pub fn sub(template: &str) -> Value {
        json!({ "Fn::Sub": template })
    }
}

/// A template parameter, resolved by the backend at deploy time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub param_type: String,
    #[serde(rename = "Default", skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A value exported from the unit once it is deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    #[serde(rename = "Value")]
    pub value: Value,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

static SUB_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^!}][^}]*)\}").expect("static regex is valid")
});

/// Collect every logical id a property tree points at.
///
/// Covers `Ref`, `Fn::GetAtt` and the `${Name}` / `${Name.Attr}` tokens of
/// `Fn::Sub`. Pseudo parameters (`AWS::...`) are skipped.
pub fn collect_references(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                push_target(target, out);
            }
            if let Some(Value::Array(args)) = map.get("Fn::GetAtt")
                && let Some(Value::String(target)) = args.first()
            {
                push_target(target, out);
            }
            if let Some(sub) = map.get("Fn::Sub") {
                let template = match sub {
                    Value::String(s) => Some(s.as_str()),
                    Value::Array(args) => args.first().and_then(Value::as_str),
                    _ => None,
                };
                if let Some(template) = template {
                    for cap in SUB_TOKEN.captures_iter(template) {
                        let token = &cap[1];
                        let target = token.split('.').next().unwrap_or(token);
                        push_target(target, out);
                    }
                }
            }
            for child in map.values() {
                collect_references(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}

fn push_target(target: &str, out: &mut BTreeSet<String>) {
    if !target.starts_with("AWS::") {
        out.insert(target.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_policy_mapping() {
        assert_eq!(RemovalPolicy::Destroy.deletion_policy(), "Delete");
        assert_eq!(RemovalPolicy::Retain.deletion_policy(), "Retain");
        assert!(RemovalPolicy::Snapshot.destroys());
        assert_eq!(RemovalPolicy::Snapshot.without_snapshot(), RemovalPolicy::Retain);
        assert_eq!(RemovalPolicy::Destroy.without_snapshot(), RemovalPolicy::Destroy);
        assert!(!RemovalPolicy::Retain.destroys());
    }

    #[test]
    fn test_handle_tokens() {
        let role = Handle::new("BastionRole");
        assert_eq!(role.reference(), json!({ "Ref": "BastionRole" }));
        assert_eq!(
            role.attr("Arn"),
            json!({ "Fn::GetAtt": ["BastionRole", "Arn"] })
        );
    }

    #[test]
    fn test_collect_references() {
        let props = json!({
            "Roles": [{ "Ref": "BastionRole" }],
            "Region": { "Ref": "AWS::Region" },
            "Key": { "Fn::GetAtt": ["DatabaseKey", "Arn"] },
            "Name": { "Fn::Sub": "${Database.Endpoint.Address}:${AWS::Region}:${!Literal}" },
        });
        let mut refs = BTreeSet::new();
        collect_references(&props, &mut refs);
        let refs: Vec<_> = refs.into_iter().collect();
        assert_eq!(refs, vec!["BastionRole", "Database", "DatabaseKey"]);
    }
}
