//! `bastion validate` - build, synthesize and report exposure

use anyhow::Result;

use crate::Context;
use crate::stacks::Deployment;
use crate::ui;

/// All construction checks already ran while the unit was built; this
/// renders the template and reports what a reviewer should look at.
pub fn run(ctx: &Context, deployment: &Deployment) -> Result<()> {
    let template = deployment.synthesize().map_err(super::explain)?;

    if !ctx.quiet {
        ui::header(&format!("Validate {}", deployment.graph.id()));
        ui::kv("variant", &deployment.variant.to_string());
        ui::kv(
            "environment",
            &format!(
                "{}/{}",
                deployment.props.env.account, deployment.props.env.region
            ),
        );
        ui::kv("resources", &template.resources.len().to_string());
        ui::kv("parameters", &template.parameters.len().to_string());
        ui::kv("outputs", &template.outputs.len().to_string());
    }

    let warnings = deployment.exposure_warnings();
    if !warnings.is_empty() {
        ui::section("Exposure");
        for warning in &warnings {
            ui::warn(warning);
        }
    }

    println!();
    if warnings.is_empty() {
        ui::success("Unit is valid");
    } else {
        ui::success(&format!(
            "Unit is valid ({} exposure warning{})",
            warnings.len(),
            if warnings.len() == 1 { "" } else { "s" }
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use crate::config::{AppConfig, Variant};

    #[test]
    fn test_validate_reports_but_does_not_fail_on_exposure() {
        let config = AppConfig::default().with_overrides(Some(Variant::BastionDb), None);
        let deployment =
            app::bootstrap(Some("123456789012"), Some("eu-west-1"), &config).unwrap();
        assert!(!deployment.exposure_warnings().is_empty());

        let ctx = Context {
            verbose: 0,
            quiet: true,
        };
        assert!(run(&ctx, &deployment).is_ok());
    }
}
