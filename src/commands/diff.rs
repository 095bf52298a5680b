//! `bastion diff` - compare the unit with a previously synthesized template

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{ChangeKind, DiffSummary, ResourceDiff, Template, compute_diffs, group_by_type};
use std::path::Path;

use crate::Context;
use crate::paths;
use crate::stacks::Deployment;
use crate::ui;

pub fn run(ctx: &Context, deployment: &Deployment, against: &Path) -> Result<()> {
    let path = paths::expand(&against.to_string_lossy());
    let old = Template::load(&path)
        .map_err(super::explain)
        .with_context(|| format!("Could not load {}", path.display()))?;
    let new = deployment.synthesize().map_err(super::explain)?;

    ui::header("Template Diff");
    ui::kv("against", &path.display().to_string());

    let diffs = compute_diffs(&old, &new);
    let summary = DiffSummary::from_diffs(&diffs);

    if !summary.has_changes() {
        println!();
        ui::success("No changes - the unit matches the template");
        return Ok(());
    }

    let groups = group_by_type(&diffs);
    let mut types: Vec<&String> = groups.keys().collect();
    types.sort();

    for resource_type in types {
        ui::section(resource_type);
        for diff in &groups[resource_type] {
            print_diff(diff);
            if ctx.verbose > 0 && diff.change == ChangeKind::Modified {
                show_resource_diff(&old, &new, &diff.logical_id);
            }
        }
    }

    println!();
    println!(
        "{} to add, {} to change, {} to remove",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.removals.to_string().red()
    );

    Ok(())
}

fn print_diff(diff: &ResourceDiff) {
    match diff.change {
        ChangeKind::Added => println!("  {} {}", "+".green(), diff.logical_id),
        ChangeKind::Removed => println!("  {} {}", "-".red(), diff.logical_id),
        ChangeKind::Replaced => println!(
            "  {} {} {}",
            "±".red(),
            diff.logical_id,
            "(type changed, will be replaced)".dimmed()
        ),
        ChangeKind::Modified => {
            println!("  {} {}", "~".yellow(), diff.logical_id);
            if !diff.changed_properties.is_empty() {
                ui::dim(&format!("    {}", diff.changed_properties.join(", ")));
            }
        }
    }
}

/// Line diff of one resource's JSON between the two templates
fn show_resource_diff(old: &Template, new: &Template, logical_id: &str) {
    let render = |template: &Template| {
        template
            .resources
            .get(logical_id)
            .and_then(|r| serde_json::to_string_pretty(r).ok())
            .map(|s| s + "\n")
            .unwrap_or_default()
    };
    let text_a = render(old);
    let text_b = render(new);

    let diff = similar::TextDiff::from_lines(&text_a, &text_b);
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => print!("      {}", format!("- {change}").red()),
            similar::ChangeTag::Insert => print!("      {}", format!("+ {change}").green()),
            similar::ChangeTag::Equal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use crate::config::{AppConfig, Variant};

    const ACCOUNT: Option<&str> = Some("123456789012");
    const REGION: Option<&str> = Some("eu-west-1");

    fn ctx() -> Context {
        Context {
            verbose: 1,
            quiet: false,
        }
    }

    #[test]
    fn test_diff_against_previous_variant() {
        let bastion = app::bootstrap(ACCOUNT, REGION, &AppConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bastion.json");
        bastion.synthesize().unwrap().write(&path).unwrap();

        let config = AppConfig::default().with_overrides(Some(Variant::BastionDb), None);
        let with_db = app::bootstrap(ACCOUNT, REGION, &config).unwrap();
        run(&ctx(), &with_db, &path).unwrap();

        let diffs = compute_diffs(
            &Template::load(&path).unwrap(),
            &with_db.synthesize().unwrap(),
        );
        let summary = DiffSummary::from_diffs(&diffs);
        assert!(summary.additions > 0);
        assert_eq!(summary.removals, 0);
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let deployment = app::bootstrap(ACCOUNT, REGION, &AppConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = run(&ctx(), &deployment, &dir.path().join("none.json")).unwrap_err();
        assert!(format!("{err:#}").contains("template not found"));
    }
}
