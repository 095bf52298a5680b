//! Bastion unit with a PostgreSQL database the bastion can reach
//!
//! Everything from [`super::bastion`], then Secret, Security Group,
//! Encryption Key, Database Instance and finally the connect grant on the
//! bastion role.
//!
//! The database sits in the public subnets, is publicly accessible and its
//! security group admits PostgreSQL from any IPv4 address. Those defaults
//! are kept and reported by [`super::exposure_warnings`].

use cfnkit::{
    Alias, DatabaseCredentials, DatabaseHandles, DatabaseOptions, DatabasePlacement,
    GenerateSecretString, InstanceType, Key, Peer, Port, Secret, SecurityGroup, SubnetType,
    declare_database,
};
use declarative::{Handle, ResourceGraph, Result};

use super::bastion::BastionHandles;
use super::naming::Naming;
use crate::config::DatabaseConfig;

/// Handles to the database part of the unit
#[derive(Debug, Clone)]
pub struct DatabaseUnitHandles {
    pub secret: Handle,
    pub database: DatabaseHandles,
}

fn options(naming: &Naming, config: &DatabaseConfig) -> DatabaseOptions {
    let mut options = DatabaseOptions::postgres(naming.database_identifier());
    options.version = config.engine_version;
    options.instance_type = InstanceType::of(config.instance_class, config.instance_size);
    options.allocated_storage_gib = config.allocated_storage_gib;
    options.backup_retention_days = config.backup_retention_days;
    options.removal_policy = config.removal_policy;
    options.deletion_protection = config.deletion_protection;
    options.multi_az = config.multi_az;
    options.publicly_accessible = config.publicly_accessible;
    options
}

/// Declare the database resources next to an already declared bastion
pub fn declare(
    graph: &mut ResourceGraph,
    naming: &Naming,
    bastion: &BastionHandles,
    config: &DatabaseConfig,
) -> Result<DatabaseUnitHandles> {
    let options = options(naming, config);
    // Reject contradictory settings before the first database declaration
    options.check("Database")?;
    // A snapshot is only usable while its key and credentials exist
    let companion = options.removal_policy.without_snapshot();

    let generation = GenerateSecretString::for_username(&config.username);
    let secret = graph.add(
        &Secret::generated("DatabaseSecret", naming.secret(), generation.clone())
            .with_description(format!("Credentials for {}", options.identifier))
            .with_removal_policy(companion),
    )?;

    let group = SecurityGroup::new(
        "DatabaseSecurityGroup",
        "Security group for the database",
        &bastion.network.vpc,
    )
    .with_name(naming.security_group())
    .with_ingress(
        Peer::AnyIpv4,
        Port::tcp(options.version.port()),
        "Allow PostgreSQL access",
    );
    if group.allows_any_ipv4() {
        log::warn!(
            "{} admits port {} from 0.0.0.0/0",
            naming.security_group(),
            options.version.port()
        );
    }
    let security_group = graph.add(&group)?;

    let key = graph.add(
        &Key::new("DatabaseKey", format!("Storage key for {}", options.identifier))
            .with_rotation(true)
            .with_removal_policy(companion),
    )?;
    graph.add(&Alias::new("DatabaseKeyAlias", naming.key_alias(), &key))?;

    if options.publicly_accessible {
        log::warn!(
            "database {} is publicly accessible from the public subnets",
            options.identifier
        );
    }

    let placement = DatabasePlacement {
        subnets: bastion.network.subnets(SubnetType::Public).to_vec(),
        security_groups: vec![security_group],
        encryption_key: Some(key),
        credentials: DatabaseCredentials::from_secret(&secret, &generation),
    };
    let database = declare_database(graph, "Database", options, placement)?;

    database.grant_connect(graph, "BastionDatabaseConnect", &bastion.role)?;

    Ok(DatabaseUnitHandles { secret, database })
}

/// Outputs the database unit adds
pub fn declare_outputs(graph: &mut ResourceGraph, handles: &DatabaseUnitHandles) -> Result<()> {
    graph.add_output(
        "DatabaseEndpoint",
        handles.database.endpoint_address(),
        Some("Database hostname"),
    )?;
    graph.add_output("DatabasePort", handles.database.endpoint_port(), None)?;
    graph.add_output(
        "DatabaseSecretArn",
        handles.secret.reference(),
        Some("Secret holding the database credentials"),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BastionConfig, NamingConfig};
    use crate::stacks::bastion::{self, BastionSettings};
    use declarative::{Environment, Error, RemovalPolicy, StackProps, synthesize};
    use serde_json::json;

    fn build(config: &DatabaseConfig) -> (ResourceGraph, Result<DatabaseUnitHandles>) {
        let mut graph = ResourceGraph::new("AppStack");
        let naming = Naming::new("AppStack", NamingConfig::default());
        let bastion = bastion::declare(
            &mut graph,
            &naming,
            &BastionSettings::from(&BastionConfig::default()),
        )
        .unwrap();
        let handles = declare(&mut graph, &naming, &bastion, config);
        (graph, handles)
    }

    #[test]
    fn test_database_uses_the_declared_group() {
        let (graph, handles) = build(&DatabaseConfig::default());
        let handles = handles.unwrap();

        let db = graph.node(&handles.database.instance).unwrap();
        assert_eq!(
            db.properties["VPCSecurityGroups"],
            json!([{ "Fn::GetAtt": ["DatabaseSecurityGroup", "GroupId"] }])
        );

        let group = graph.get("DatabaseSecurityGroup").unwrap();
        let ingress = group.properties["SecurityGroupIngress"].as_array().unwrap();
        assert_eq!(ingress.len(), 1);
        assert_eq!(ingress[0]["CidrIp"], "0.0.0.0/0");
        assert_eq!(ingress[0]["IpProtocol"], "tcp");
        assert_eq!(ingress[0]["FromPort"], 5432);
        assert_eq!(ingress[0]["ToPort"], 5432);
        assert_eq!(group.properties["GroupName"], "AppStack-database-sg");
    }

    #[test]
    fn test_credentials_come_from_the_secret() {
        let (graph, handles) = build(&DatabaseConfig::default());
        let handles = handles.unwrap();
        let db = graph.node(&handles.database.instance).unwrap();

        for field in ["MasterUsername", "MasterUserPassword"] {
            let value = &db.properties[field];
            assert!(!value.is_string(), "{field} must not be a literal");
            assert_eq!(value["Fn::Join"][1][1], json!({ "Ref": "DatabaseSecret" }));
        }
    }

    #[test]
    fn test_database_settings() {
        let (graph, handles) = build(&DatabaseConfig::default());
        let handles = handles.unwrap();
        let db = graph.node(&handles.database.instance).unwrap();

        assert_eq!(db.properties["DBInstanceIdentifier"], "app-stack-db");
        assert_eq!(db.properties["EngineVersion"], "16.4");
        assert_eq!(db.properties["DBInstanceClass"], "db.t3.micro");
        assert_eq!(db.properties["AllocatedStorage"], "20");
        assert_eq!(db.properties["BackupRetentionPeriod"], 7);
        assert_eq!(db.properties["StorageEncrypted"], true);
        assert_eq!(
            db.properties["KmsKeyId"],
            json!({ "Fn::GetAtt": ["DatabaseKey", "Arn"] })
        );
        assert_eq!(db.properties["PubliclyAccessible"], true);
        assert_eq!(db.properties["MultiAZ"], false);
        assert_eq!(db.properties["EnableIAMDatabaseAuthentication"], true);
        assert_eq!(db.properties["PerformanceInsightsRetentionPeriod"], 7);
        assert_eq!(db.properties["EnableCloudwatchLogsExports"], json!(["postgresql"]));

        let subnet_group = graph.node(&handles.database.subnet_group).unwrap();
        assert_eq!(
            subnet_group.properties["SubnetIds"],
            json!([{ "Ref": "VpcPublicSubnet1Subnet" }, { "Ref": "VpcPublicSubnet2Subnet" }])
        );
    }

    #[test]
    fn test_single_connect_grant_on_the_role() {
        let (graph, handles) = build(&DatabaseConfig::default());
        assert!(handles.is_ok());
        assert_eq!(graph.count_of_type("AWS::IAM::Policy"), 1);
        let grant = graph.get("BastionDatabaseConnect").unwrap();
        assert_eq!(grant.properties["Roles"], json!([{ "Ref": "BastionRole" }]));
    }

    #[test]
    fn test_protection_with_destroy_is_rejected_before_declaring() {
        let config = DatabaseConfig {
            deletion_protection: true,
            ..DatabaseConfig::default()
        };
        let (graph, handles) = build(&config);
        assert!(matches!(handles, Err(Error::PolicyContradiction { .. })));
        assert!(graph.get("DatabaseSecret").is_none());
        assert_eq!(graph.count_of_type("AWS::RDS::DBInstance"), 0);
    }

    #[test]
    fn test_retained_database_keeps_key_and_secret() {
        let config = DatabaseConfig {
            deletion_protection: true,
            removal_policy: RemovalPolicy::Snapshot,
            ..DatabaseConfig::default()
        };
        // Snapshot still removes the instance, so protection contradicts it
        let (_, handles) = build(&config);
        assert!(handles.is_err());

        let config = DatabaseConfig {
            deletion_protection: true,
            removal_policy: RemovalPolicy::Retain,
            ..DatabaseConfig::default()
        };
        let (graph, handles) = build(&config);
        let handles = handles.unwrap();
        assert_eq!(
            graph.get("DatabaseKey").unwrap().removal_policy,
            Some(RemovalPolicy::Retain)
        );
        assert_eq!(
            graph.node(&handles.secret).unwrap().removal_policy,
            Some(RemovalPolicy::Retain)
        );
    }

    #[test]
    fn test_snapshot_database_synthesizes_deployable_policies() {
        let config = DatabaseConfig {
            removal_policy: RemovalPolicy::Snapshot,
            ..DatabaseConfig::default()
        };
        let (graph, handles) = build(&config);
        handles.unwrap();

        let props = StackProps::new(
            Environment::resolve(Some("123456789012"), Some("eu-west-1")).unwrap(),
        );
        let template = synthesize(&graph, &props).unwrap();
        for (id, resource) in &template.resources {
            let policy = resource.deletion_policy.as_deref();
            if resource.resource_type == "AWS::RDS::DBInstance" {
                assert_eq!(policy, Some("Snapshot"), "{id}");
            } else {
                assert_ne!(policy, Some("Snapshot"), "{id}");
            }
        }
        assert_eq!(
            template.resources["DatabasePostgresqlLogGroup"].deletion_policy.as_deref(),
            Some("Retain")
        );
        assert_eq!(
            template.resources["DatabaseKey"].deletion_policy.as_deref(),
            Some("Retain")
        );
    }

    #[test]
    fn test_outputs() {
        let (mut graph, handles) = build(&DatabaseConfig::default());
        declare_outputs(&mut graph, &handles.unwrap()).unwrap();
        let endpoint = &graph.outputs()["DatabaseEndpoint"];
        assert_eq!(
            endpoint.value,
            json!({ "Fn::GetAtt": ["Database", "Endpoint.Address"] })
        );
        assert_eq!(
            graph.outputs()["DatabaseSecretArn"].value,
            json!({ "Ref": "DatabaseSecret" })
        );
    }
}
