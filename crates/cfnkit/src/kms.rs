//! KMS declarations

use crate::iam::POLICY_VERSION;
use crate::names;
use declarative::{Handle, Pseudo, RemovalPolicy, Resource, Result, intrinsic};
use serde_json::{Value, json};

/// `AWS::KMS::Key` whose policy delegates to the account's IAM
#[derive(Debug, Clone)]
pub struct Key {
    id: String,
    description: String,
    enable_key_rotation: bool,
    removal_policy: Option<RemovalPolicy>,
}

impl Key {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            enable_key_rotation: false,
            removal_policy: None,
        }
    }

    pub fn with_rotation(mut self, enabled: bool) -> Self {
        self.enable_key_rotation = enabled;
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }
}

impl Resource for Key {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::KMS::Key"
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn properties(&self) -> Value {
        let root = intrinsic::join(
            "",
            vec![
                json!("arn:"),
                Pseudo::Partition.reference(),
                json!(":iam::"),
                Pseudo::AccountId.reference(),
                json!(":root"),
            ],
        );
        json!({
            "Description": self.description,
            "EnableKeyRotation": self.enable_key_rotation,
            "KeyPolicy": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Action": "kms:*",
                    "Effect": "Allow",
                    "Principal": { "AWS": root },
                    "Resource": "*",
                }],
            },
        })
    }

    fn removal_policy(&self) -> Option<RemovalPolicy> {
        self.removal_policy
    }

    fn is_stateful(&self) -> bool {
        true
    }
}

/// `AWS::KMS::Alias`
#[derive(Debug, Clone)]
pub struct Alias {
    id: String,
    name: String,
    target: Handle,
}

impl Alias {
    pub fn new(id: impl Into<String>, name: impl Into<String>, target: &Handle) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            target: target.clone(),
        }
    }
}

impl Resource for Alias {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::KMS::Alias"
    }

    fn description(&self) -> String {
        format!("Key alias {}", self.name)
    }

    fn properties(&self) -> Value {
        json!({
            "AliasName": self.name,
            "TargetKeyId": self.target.attr("Arn"),
        })
    }

    fn physical_name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn is_taggable(&self) -> bool {
        false
    }

    fn validate(&self) -> Result<()> {
        names::key_alias(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::ResourceGraph;

    #[test]
    fn test_key_with_alias() {
        let mut graph = ResourceGraph::new("Unit");
        let key = graph
            .add(
                &Key::new("DatabaseKey", "Storage key")
                    .with_rotation(true)
                    .with_removal_policy(RemovalPolicy::Destroy),
            )
            .unwrap();
        let alias = graph
            .add(&Alias::new("DatabaseKeyAlias", "alias/unit-db", &key))
            .unwrap();

        assert_eq!(graph.node(&key).unwrap().properties["EnableKeyRotation"], true);
        assert_eq!(
            graph.node(&alias).unwrap().properties["TargetKeyId"],
            json!({ "Fn::GetAtt": ["DatabaseKey", "Arn"] })
        );
    }

    #[test]
    fn test_alias_rules() {
        let mut graph = ResourceGraph::new("Unit");
        let key = graph
            .add(&Key::new("K", "k").with_removal_policy(RemovalPolicy::Retain))
            .unwrap();
        assert!(graph.add(&Alias::new("A", "unit-db", &key)).is_err());
    }
}
