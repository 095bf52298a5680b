//! `bastion list` - show declared resources

use anyhow::Result;
use colored::Colorize;
use declarative::Node;
use std::collections::BTreeMap;

use crate::Context;
use crate::stacks::Deployment;
use crate::ui;

pub fn run(ctx: &Context, deployment: &Deployment, target: Option<&str>) -> Result<()> {
    let nodes = deployment.graph.filter_by_target(target);

    ui::header(&format!(
        "{} ({})",
        deployment.graph.id(),
        deployment.variant
    ));

    if nodes.is_empty() {
        if let Some(target) = target {
            ui::warn(&format!("No declarations match '{target}'"));
        }
        return Ok(());
    }

    for (resource_type, nodes) in group(&nodes) {
        ui::section(resource_type);
        for node in nodes {
            print_node(node, ctx);
        }
    }

    println!();
    ui::dim(&format!(
        "{} of {} declarations",
        nodes.len(),
        deployment.graph.len()
    ));

    Ok(())
}

fn group<'a>(nodes: &[&'a Node]) -> BTreeMap<&'a str, Vec<&'a Node>> {
    let mut groups: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();
    for node in nodes {
        groups
            .entry(node.resource_type.as_str())
            .or_default()
            .push(node);
    }
    groups
}

fn print_node(node: &Node, ctx: &Context) {
    let name = node
        .physical_name
        .as_deref()
        .map(|n| format!(" {}", n.cyan()))
        .unwrap_or_default();
    let policy = node
        .removal_policy
        .map(|p| format!(" [{}]", p.deletion_policy()).yellow().to_string())
        .unwrap_or_default();

    println!("  {}{name}{policy}", node.logical_id.bold());

    if ctx.verbose > 0 {
        ui::dim(&format!("  {}", node.description));
        if !node.depends_on.is_empty() {
            ui::dim(&format!("  depends on {}", node.depends_on.join(", ")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use crate::config::{AppConfig, Variant};

    #[test]
    fn test_group_is_sorted_by_type() {
        let config = AppConfig::default().with_overrides(Some(Variant::BastionDb), None);
        let deployment =
            app::bootstrap(Some("123456789012"), Some("eu-west-1"), &config).unwrap();
        let nodes = deployment.graph.filter_by_target(Some("iam"));
        let groups = group(&nodes);

        let types: Vec<&str> = groups.keys().copied().collect();
        assert_eq!(
            types,
            vec!["AWS::IAM::InstanceProfile", "AWS::IAM::Policy", "AWS::IAM::Role"]
        );
        assert_eq!(groups["AWS::IAM::Role"].len(), 2);
    }
}
