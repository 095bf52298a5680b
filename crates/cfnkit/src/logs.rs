//! CloudWatch Logs declarations

use crate::names;
use declarative::{RemovalPolicy, Resource, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Retention periods the service accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionDays {
    OneDay,
    ThreeDays,
    FiveDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl RetentionDays {
    pub fn days(&self) -> u32 {
        match self {
            Self::OneDay => 1,
            Self::ThreeDays => 3,
            Self::FiveDays => 5,
            Self::OneWeek => 7,
            Self::TwoWeeks => 14,
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear => 365,
        }
    }
}

/// `AWS::Logs::LogGroup`
#[derive(Debug, Clone)]
pub struct LogGroup {
    id: String,
    name: String,
    retention: RetentionDays,
    removal_policy: Option<RemovalPolicy>,
}

impl LogGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>, retention: RetentionDays) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            retention,
            removal_policy: None,
        }
    }

    /// Log groups cannot be snapshotted, so `Snapshot` is kept as `Retain`
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy.without_snapshot());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Resource for LogGroup {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::Logs::LogGroup"
    }

    fn description(&self) -> String {
        format!("Log group {} ({} days)", self.name, self.retention.days())
    }

    fn properties(&self) -> Value {
        json!({
            "LogGroupName": self.name,
            "RetentionInDays": self.retention.days(),
        })
    }

    fn physical_name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn removal_policy(&self) -> Option<RemovalPolicy> {
        self.removal_policy
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn validate(&self) -> Result<()> {
        names::log_group_name(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Error, ResourceGraph};

    #[test]
    fn test_log_group_properties() {
        let group = LogGroup::new("SessionLogs", "/ssm/ec2/session", RetentionDays::OneWeek)
            .with_removal_policy(RemovalPolicy::Destroy);
        assert_eq!(
            group.properties(),
            json!({ "LogGroupName": "/ssm/ec2/session", "RetentionInDays": 7 })
        );
    }

    #[test]
    fn test_snapshot_policy_retains_log_group() {
        let group = LogGroup::new("SessionLogs", "/ssm/ec2/session", RetentionDays::OneWeek)
            .with_removal_policy(RemovalPolicy::Snapshot);
        assert_eq!(group.removal_policy(), Some(RemovalPolicy::Retain));
    }

    #[test]
    fn test_log_group_requires_removal_policy() {
        let mut graph = ResourceGraph::new("Unit");
        let group = LogGroup::new("SessionLogs", "/ssm/ec2/session", RetentionDays::OneWeek);
        assert!(matches!(
            graph.add(&group),
            Err(Error::ImplicitRemovalPolicy { .. })
        ));
    }

    #[test]
    fn test_retention_days() {
        assert_eq!(RetentionDays::OneDay.days(), 1);
        assert_eq!(RetentionDays::OneWeek.days(), 7);
        assert_eq!(RetentionDays::OneYear.days(), 365);
    }
}
