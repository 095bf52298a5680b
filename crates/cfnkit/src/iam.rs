//! IAM declarations: roles, instance profiles, inline policies

use crate::names;
use declarative::{Handle, Pseudo, Resource, Result, intrinsic};
use serde_json::{Value, json};

pub const POLICY_VERSION: &str = "2012-10-17";

/// A service allowed to assume a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrincipal(String);

impl ServicePrincipal {
    pub fn new(service: impl Into<String>) -> Self {
        Self(service.into())
    }

    /// `ec2.amazonaws.com`
    pub fn ec2() -> Self {
        Self::new("ec2.amazonaws.com")
    }

    /// `monitoring.rds.amazonaws.com`
    pub fn rds_monitoring() -> Self {
        Self::new("monitoring.rds.amazonaws.com")
    }

    pub fn service(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
        }
    }
}

/// One statement of a policy document
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    /// Allow `actions` on `resources`
    pub fn allow(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
            resources,
        }
    }

    pub fn to_json(&self) -> Value {
        let action = match self.actions.as_slice() {
            [single] => json!(single),
            many => json!(many),
        };
        let resource = match self.resources.as_slice() {
            [single] => single.clone(),
            many => Value::Array(many.to_vec()),
        };
        json!({
            "Action": action,
            "Effect": self.effect.as_str(),
            "Resource": resource,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self { statements }
    }

    pub fn to_json(&self) -> Value {
        let statements: Vec<Value> = self.statements.iter().map(PolicyStatement::to_json).collect();
        json!({ "Version": POLICY_VERSION, "Statement": statements })
    }
}

/// A backend-maintained permission bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedPolicy {
    name: String,
}

impl ManagedPolicy {
    /// An AWS managed policy, e.g. `AmazonSSMManagedInstanceCore` or
    /// `service-role/AmazonRDSEnhancedMonitoringRole`
    pub fn aws_managed(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Partition-aware ARN
    pub fn arn(&self) -> Value {
        intrinsic::join(
            "",
            vec![
                json!("arn:"),
                Pseudo::Partition.reference(),
                json!(format!(":iam::aws:policy/{}", self.name)),
            ],
        )
    }
}

/// `AWS::IAM::Role`
#[derive(Debug, Clone)]
pub struct Role {
    id: String,
    assumed_by: ServicePrincipal,
    description: Option<String>,
    managed_policies: Vec<ManagedPolicy>,
}

impl Role {
    pub fn new(id: impl Into<String>, assumed_by: ServicePrincipal) -> Self {
        Self {
            id: id.into(),
            assumed_by,
            description: None,
            managed_policies: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a managed policy; attaching the same policy twice is a no-op
    pub fn with_managed_policy(mut self, policy: ManagedPolicy) -> Self {
        if !self.managed_policies.contains(&policy) {
            self.managed_policies.push(policy);
        }
        self
    }

    pub fn managed_policies(&self) -> &[ManagedPolicy] {
        &self.managed_policies
    }
}

impl Resource for Role {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::IAM::Role"
    }

    fn description(&self) -> String {
        format!("Role assumable by {}", self.assumed_by.service())
    }

    fn properties(&self) -> Value {
        let mut props = json!({
            "AssumeRolePolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": self.assumed_by.service() },
                }],
            },
        });
        if let Some(description) = &self.description {
            props["Description"] = json!(description);
        }
        if !self.managed_policies.is_empty() {
            let arns: Vec<Value> = self.managed_policies.iter().map(ManagedPolicy::arn).collect();
            props["ManagedPolicyArns"] = Value::Array(arns);
        }
        props
    }
}

/// `AWS::IAM::InstanceProfile` wrapping exactly one role
#[derive(Debug, Clone)]
pub struct InstanceProfile {
    id: String,
    name: String,
    role: Handle,
}

impl InstanceProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: &Handle) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.clone(),
        }
    }
}

impl Resource for InstanceProfile {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::IAM::InstanceProfile"
    }

    fn description(&self) -> String {
        format!("Instance profile {} for {}", self.name, self.role.logical_id())
    }

    fn properties(&self) -> Value {
        json!({
            "InstanceProfileName": self.name,
            "Roles": [self.role.reference()],
        })
    }

    fn physical_name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn is_taggable(&self) -> bool {
        false
    }

    fn validate(&self) -> Result<()> {
        names::instance_profile_name(&self.name)
    }
}

/// `AWS::IAM::Policy` - an inline policy attached to roles
#[derive(Debug, Clone)]
pub struct Policy {
    id: String,
    name: String,
    document: PolicyDocument,
    roles: Vec<Handle>,
}

impl Policy {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        document: PolicyDocument,
        roles: &[&Handle],
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            document,
            roles: roles.iter().map(|r| (*r).clone()).collect(),
        }
    }
}

impl Resource for Policy {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::IAM::Policy"
    }

    fn description(&self) -> String {
        format!("Inline policy {}", self.name)
    }

    fn properties(&self) -> Value {
        let roles: Vec<Value> = self.roles.iter().map(Handle::reference).collect();
        json!({
            "PolicyName": self.name,
            "PolicyDocument": self.document.to_json(),
            "Roles": roles,
        })
    }

    fn is_taggable(&self) -> bool {
        false
    }
}
