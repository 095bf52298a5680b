//! Deployment units
//!
//! A unit is one resource graph plus the props it was built with. Exactly
//! one unit is built per run.

pub mod bastion;
pub mod bastion_db;
pub mod naming;

use declarative::{ResourceGraph, Result, StackProps, Template, synthesize};

use crate::config::{AppConfig, Variant};
use bastion::BastionSettings;
use naming::Naming;

/// A built unit, ready to synthesize
#[derive(Debug)]
pub struct Deployment {
    pub props: StackProps,
    pub graph: ResourceGraph,
    pub variant: Variant,
}

impl Deployment {
    pub fn synthesize(&self) -> Result<Template> {
        synthesize(&self.graph, &self.props)
    }

    pub fn exposure_warnings(&self) -> Vec<String> {
        exposure_warnings(&self.graph)
    }
}

/// Build the unit selected by `config.variant`
pub fn build(props: StackProps, config: &AppConfig) -> Result<Deployment> {
    let mut graph = ResourceGraph::new(&config.stack_name);
    let naming = Naming::new(&config.stack_name, config.naming.clone());

    let bastion = bastion::declare(&mut graph, &naming, &BastionSettings::from(&config.bastion))?;
    bastion::declare_outputs(&mut graph, &bastion)?;

    if config.variant == Variant::BastionDb {
        let database = bastion_db::declare(&mut graph, &naming, &bastion, &config.database)?;
        bastion_db::declare_outputs(&mut graph, &database)?;
    }

    log::info!(
        "built {} unit {} with {} resources",
        config.variant,
        config.stack_name,
        graph.len()
    );

    Ok(Deployment {
        props,
        graph,
        variant: config.variant,
    })
}

/// Network exposure a reviewer should know about
///
/// Reports security groups open to any IPv4 address and databases marked
/// publicly accessible.
pub fn exposure_warnings(graph: &ResourceGraph) -> Vec<String> {
    let mut warnings = Vec::new();

    for group in graph.nodes_of_type("AWS::EC2::SecurityGroup") {
        let open = group.properties["SecurityGroupIngress"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|rule| rule["CidrIp"] == "0.0.0.0/0");
        for rule in open {
            warnings.push(format!(
                "{} admits {} port {} from 0.0.0.0/0",
                group.logical_id,
                rule["IpProtocol"].as_str().unwrap_or("?"),
                rule["FromPort"]
            ));
        }
    }

    for db in graph.nodes_of_type("AWS::RDS::DBInstance") {
        if db.properties["PubliclyAccessible"] == true {
            warnings.push(format!("{} is publicly accessible", db.logical_id));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::Environment;

    fn props() -> StackProps {
        StackProps::new(Environment::resolve(Some("123456789012"), Some("eu-west-1")).unwrap())
            .with_tag("app", "tag")
    }

    #[test]
    fn test_bastion_unit_has_no_exposure() {
        let deployment = build(props(), &AppConfig::default()).unwrap();
        assert_eq!(deployment.variant, Variant::Bastion);
        assert_eq!(deployment.graph.count_of_type("AWS::RDS::DBInstance"), 0);
        assert!(deployment.exposure_warnings().is_empty());
    }

    #[test]
    fn test_database_unit_flags_exposure() {
        let config = AppConfig::default().with_overrides(Some(Variant::BastionDb), None);
        let deployment = build(props(), &config).unwrap();
        let warnings = deployment.exposure_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("DatabaseSecurityGroup"));
        assert!(warnings[0].contains("5432"));
        assert!(warnings[1].contains("publicly accessible"));
    }

    #[test]
    fn test_building_twice_yields_equal_templates() {
        let config = AppConfig::default().with_overrides(Some(Variant::BastionDb), None);
        let first = build(props(), &config).unwrap().synthesize().unwrap();
        let second = build(props(), &config).unwrap().synthesize().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_json_pretty().unwrap(), second.to_json_pretty().unwrap());
    }

    #[test]
    fn test_unit_tags_reach_taggable_resources() {
        let template = build(props(), &AppConfig::default())
            .unwrap()
            .synthesize()
            .unwrap();
        let role = &template.resources["BastionRole"];
        assert!(
            role.properties["Tags"]
                .as_array()
                .unwrap()
                .iter()
                .any(|t| t["Key"] == "app" && t["Value"] == "tag")
        );
        let profile = &template.resources["BastionInstanceProfile"];
        assert!(profile.properties.get("Tags").is_none());
    }

    #[test]
    fn test_contradiction_fails_the_build() {
        let mut config = AppConfig::default().with_overrides(Some(Variant::BastionDb), None);
        config.database.deletion_protection = true;
        assert!(build(props(), &config).is_err());
    }
}
