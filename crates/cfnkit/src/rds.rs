//! RDS declarations
//!
//! [`declare_database`] adds a database instance together with the pieces
//! it cannot live without: a subnet group, the enhanced-monitoring role,
//! the log groups its exports land in, and the attachment that records the
//! connection details in the credentials secret.

use crate::ec2::{InstanceClass, InstanceSize, InstanceType};
use crate::iam::{
    ManagedPolicy, Policy, PolicyDocument, PolicyStatement, Role, ServicePrincipal,
};
use crate::logs::{LogGroup, RetentionDays};
use crate::names;
use crate::secrets::{SecretAttachment, secret_field};
use declarative::{
    Error, Handle, Pseudo, RemovalPolicy, Resource, ResourceGraph, Result, intrinsic,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Monitoring intervals RDS accepts, in seconds
const MONITORING_INTERVALS: [u32; 7] = [0, 1, 5, 10, 15, 30, 60];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostgresEngineVersion {
    #[serde(rename = "15.8")]
    V15_8,
    #[serde(rename = "16.4")]
    V16_4,
}

impl PostgresEngineVersion {
    /// Full version, e.g. `16.4`
    pub fn full(&self) -> &'static str {
        match self {
            Self::V15_8 => "15.8",
            Self::V16_4 => "16.4",
        }
    }

    pub fn major(&self) -> &'static str {
        match self {
            Self::V15_8 => "15",
            Self::V16_4 => "16",
        }
    }

    /// Default listener port
    pub fn port(&self) -> u16 {
        5432
    }
}

/// Settings of a database instance that do not reference other declarations
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseOptions {
    pub identifier: String,
    pub version: PostgresEngineVersion,
    pub instance_type: InstanceType,
    pub allocated_storage_gib: u32,
    pub backup_retention_days: u32,
    pub removal_policy: RemovalPolicy,
    pub deletion_protection: bool,
    pub monitoring_interval_secs: u32,
    pub performance_insights_retention_days: Option<u32>,
    pub log_exports: Vec<String>,
    pub log_retention: RetentionDays,
    pub iam_authentication: bool,
    pub publicly_accessible: bool,
    pub multi_az: bool,
}

impl DatabaseOptions {
    /// PostgreSQL 16.4 on `db.t3.micro` with 7-day backups, 60 s
    /// monitoring, performance insights, log export and IAM auth
    pub fn postgres(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            version: PostgresEngineVersion::V16_4,
            instance_type: InstanceType::of(InstanceClass::T3, InstanceSize::Micro),
            allocated_storage_gib: 20,
            backup_retention_days: 7,
            removal_policy: RemovalPolicy::Destroy,
            deletion_protection: false,
            monitoring_interval_secs: 60,
            performance_insights_retention_days: Some(7),
            log_exports: vec!["postgresql".to_string()],
            log_retention: RetentionDays::OneDay,
            iam_authentication: true,
            publicly_accessible: false,
            multi_az: false,
        }
    }

    /// Check the settings on their own
    ///
    /// Tearing the instance down on removal while also protecting it from
    /// deletion is rejected instead of leaving the outcome to the backend.
    pub fn check(&self, resource: &str) -> Result<()> {
        names::db_identifier(&self.identifier)?;

        if self.deletion_protection && self.removal_policy.destroys() {
            return Err(Error::PolicyContradiction {
                resource: resource.to_string(),
                detail: format!(
                    "removal policy '{}' deletes the instance on teardown but deletion protection is enabled",
                    self.removal_policy.deletion_policy()
                ),
            });
        }

        if !MONITORING_INTERVALS.contains(&self.monitoring_interval_secs) {
            return Err(Error::InvalidProperty {
                resource: resource.to_string(),
                property: "MonitoringInterval",
                reason: format!(
                    "{} is not one of {MONITORING_INTERVALS:?}",
                    self.monitoring_interval_secs
                ),
            });
        }

        if let Some(days) = self.performance_insights_retention_days
            && !(days == 7 || (days % 31 == 0 && (31..=731).contains(&days)) || days == 731)
        {
            return Err(Error::InvalidProperty {
                resource: resource.to_string(),
                property: "PerformanceInsightsRetentionPeriod",
                reason: format!("{days} must be 7, 731 or a multiple of 31 up to 713"),
            });
        }

        if self.backup_retention_days > 35 {
            return Err(Error::InvalidProperty {
                resource: resource.to_string(),
                property: "BackupRetentionPeriod",
                reason: format!("{} exceeds 35 days", self.backup_retention_days),
            });
        }

        if !(20..=65536).contains(&self.allocated_storage_gib) {
            return Err(Error::InvalidProperty {
                resource: resource.to_string(),
                property: "AllocatedStorage",
                reason: format!("{} GiB is outside 20-65536", self.allocated_storage_gib),
            });
        }

        Ok(())
    }

    fn log_group_name(&self, export: &str) -> String {
        format!("/aws/rds/instance/{}/{export}", self.identifier)
    }
}

/// Credentials sourced from a generated secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub secret: Handle,
    pub username: String,
    /// Whether the secret's generation rules only produce passwords RDS accepts
    pub rds_compatible: bool,
}

impl DatabaseCredentials {
    pub fn from_secret(secret: &Handle, generation: &crate::secrets::GenerateSecretString) -> Self {
        Self {
            secret: secret.clone(),
            username: generation.username.clone(),
            rds_compatible: generation.is_rds_compatible(),
        }
    }

    /// Reject a secret whose generated password RDS would refuse
    pub fn check(&self, resource: &str) -> Result<()> {
        if self.rds_compatible {
            return Ok(());
        }
        Err(Error::PolicyContradiction {
            resource: resource.to_string(),
            detail: "credentials secret may generate characters RDS rejects ('/', '@', '\"', space)"
                .to_string(),
        })
    }
}

/// Where the instance lives and what it is wired to
#[derive(Debug, Clone)]
pub struct DatabasePlacement {
    pub subnets: Vec<Handle>,
    pub security_groups: Vec<Handle>,
    pub encryption_key: Option<Handle>,
    pub credentials: DatabaseCredentials,
}

/// `AWS::RDS::DBSubnetGroup`
#[derive(Debug, Clone)]
struct SubnetGroup {
    id: String,
    description: String,
    subnets: Vec<Handle>,
}

impl Resource for SubnetGroup {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::RDS::DBSubnetGroup"
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn properties(&self) -> Value {
        let subnets: Vec<Value> = self.subnets.iter().map(Handle::reference).collect();
        json!({
            "DBSubnetGroupDescription": self.description,
            "SubnetIds": subnets,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.subnets.len() < 2 {
            return Err(Error::InvalidProperty {
                resource: self.id.clone(),
                property: "SubnetIds",
                reason: "needs subnets in at least two availability zones".to_string(),
            });
        }
        Ok(())
    }
}

/// `AWS::RDS::DBInstance`
#[derive(Debug, Clone)]
pub struct DatabaseInstance {
    id: String,
    options: DatabaseOptions,
    credentials: DatabaseCredentials,
    subnet_group: Handle,
    security_groups: Vec<Handle>,
    encryption_key: Option<Handle>,
    monitoring_role: Option<Handle>,
    log_groups: Vec<Handle>,
}

impl Resource for DatabaseInstance {
    fn logical_id(&self) -> String {
        self.id.clone()
    }

    fn resource_type(&self) -> &'static str {
        "AWS::RDS::DBInstance"
    }

    fn description(&self) -> String {
        format!(
            "PostgreSQL {} on {} ({})",
            self.options.version.full(),
            self.options.instance_type.db_class(),
            self.options.identifier
        )
    }

    fn properties(&self) -> Value {
        let o = &self.options;
        let groups: Vec<Value> = self
            .security_groups
            .iter()
            .map(|g| g.attr("GroupId"))
            .collect();

        let mut props = json!({
            "AllocatedStorage": o.allocated_storage_gib.to_string(),
            "BackupRetentionPeriod": o.backup_retention_days,
            "CopyTagsToSnapshot": true,
            "DBInstanceClass": o.instance_type.db_class(),
            "DBInstanceIdentifier": o.identifier,
            "DBSubnetGroupName": self.subnet_group.reference(),
            "DeletionProtection": o.deletion_protection,
            "EnableCloudwatchLogsExports": o.log_exports,
            "EnableIAMDatabaseAuthentication": o.iam_authentication,
            "Engine": "postgres",
            "EngineVersion": o.version.full(),
            "MasterUsername": secret_field(&self.credentials.secret, "username"),
            "MasterUserPassword": secret_field(&self.credentials.secret, "password"),
            "MonitoringInterval": o.monitoring_interval_secs,
            "MultiAZ": o.multi_az,
            "Port": o.version.port().to_string(),
            "PubliclyAccessible": o.publicly_accessible,
            "StorageType": "gp2",
            "VPCSecurityGroups": groups,
        });

        if let Some(key) = &self.encryption_key {
            props["StorageEncrypted"] = json!(true);
            props["KmsKeyId"] = key.attr("Arn");
        }
        if let Some(role) = &self.monitoring_role {
            props["MonitoringRoleArn"] = role.attr("Arn");
        }
        match o.performance_insights_retention_days {
            Some(days) => {
                props["EnablePerformanceInsights"] = json!(true);
                props["PerformanceInsightsRetentionPeriod"] = json!(days);
            }
            None => props["EnablePerformanceInsights"] = json!(false),
        }
        props
    }

    fn physical_name(&self) -> Option<String> {
        Some(self.options.identifier.clone())
    }

    fn removal_policy(&self) -> Option<RemovalPolicy> {
        Some(self.options.removal_policy)
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn depends_on(&self) -> Vec<String> {
        self.log_groups
            .iter()
            .map(|g| g.logical_id().to_string())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        self.options.check(&self.id)?;
        self.credentials.check(&self.id)?;
        if self.options.monitoring_interval_secs > 0 && self.monitoring_role.is_none() {
            return Err(Error::InvalidProperty {
                resource: self.id.clone(),
                property: "MonitoringRoleArn",
                reason: "enhanced monitoring needs a monitoring role".to_string(),
            });
        }
        Ok(())
    }
}

/// Handles to a declared database and the facts needed to grant access
#[derive(Debug, Clone)]
pub struct DatabaseHandles {
    pub instance: Handle,
    pub subnet_group: Handle,
    pub monitoring_role: Option<Handle>,
    pub log_groups: Vec<Handle>,
    pub secret_attachment: Handle,
    pub identifier: String,
    pub username: String,
}

impl DatabaseHandles {
    /// ARN of the IAM database user, e.g.
    /// `arn:aws:rds-db:eu-west-1:123456789012:dbuser:db-ABC/postgres`
    pub fn db_user_arn(&self) -> Value {
        intrinsic::join(
            "",
            vec![
                json!("arn:"),
                Pseudo::Partition.reference(),
                json!(":rds-db:"),
                Pseudo::Region.reference(),
                json!(":"),
                Pseudo::AccountId.reference(),
                json!(":dbuser:"),
                self.instance.attr("DbiResourceId"),
                json!(format!("/{}", self.username)),
            ],
        )
    }

    /// Allow `role` to connect as the master user through IAM auth
    ///
    /// This is the only grant path: one inline policy on the role.
    pub fn grant_connect(
        &self,
        graph: &mut ResourceGraph,
        id: &str,
        role: &Handle,
    ) -> Result<Handle> {
        let document = PolicyDocument::new(vec![PolicyStatement::allow(
            &["rds-db:connect"],
            vec![self.db_user_arn()],
        )]);
        let name = format!("{id}Policy");
        graph.add(&Policy::new(id, name, document, &[role]))
    }

    /// `{"Fn::GetAtt": [instance, "Endpoint.Address"]}`
    pub fn endpoint_address(&self) -> Value {
        self.instance.attr("Endpoint.Address")
    }

    pub fn endpoint_port(&self) -> Value {
        self.instance.attr("Endpoint.Port")
    }
}

/// Declare a database instance and its supporting resources
///
/// The settings are checked before anything is added, so a rejected
/// database leaves the graph untouched.
pub fn declare_database(
    graph: &mut ResourceGraph,
    id: &str,
    options: DatabaseOptions,
    placement: DatabasePlacement,
) -> Result<DatabaseHandles> {
    options.check(id)?;
    placement.credentials.check(id)?;

    let subnet_group = graph.add(&SubnetGroup {
        id: format!("{id}SubnetGroup"),
        description: format!("Subnet group for {}", options.identifier),
        subnets: placement.subnets,
    })?;

    let monitoring_role = if options.monitoring_interval_secs > 0 {
        let role = Role::new(format!("{id}MonitoringRole"), ServicePrincipal::rds_monitoring())
            .with_managed_policy(ManagedPolicy::aws_managed(
                "service-role/AmazonRDSEnhancedMonitoringRole",
            ));
        Some(graph.add(&role)?)
    } else {
        None
    };

    let mut log_groups = Vec::with_capacity(options.log_exports.len());
    for export in &options.log_exports {
        let group = LogGroup::new(
            format!("{id}{}LogGroup", capitalize(export)),
            options.log_group_name(export),
            options.log_retention,
        )
        .with_removal_policy(options.removal_policy);
        log_groups.push(graph.add(&group)?);
    }

    let identifier = options.identifier.clone();
    let username = placement.credentials.username.clone();
    let secret = placement.credentials.secret.clone();

    let instance = graph.add(&DatabaseInstance {
        id: id.to_string(),
        options,
        credentials: placement.credentials,
        subnet_group: subnet_group.clone(),
        security_groups: placement.security_groups,
        encryption_key: placement.encryption_key,
        monitoring_role: monitoring_role.clone(),
        log_groups: log_groups.clone(),
    })?;

    let secret_attachment = graph.add(&SecretAttachment::new(
        format!("{id}SecretAttachment"),
        &secret,
        &instance,
        "AWS::RDS::DBInstance",
    ))?;

    log::info!("declared database {identifier} ({id})");

    Ok(DatabaseHandles {
        instance,
        subnet_group,
        monitoring_role,
        log_groups,
        secret_attachment,
        identifier,
        username,
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
