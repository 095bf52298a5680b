//! `bastion synth` - print or write the template

use anyhow::{Context as AnyhowContext, Result};
use std::path::Path;

use crate::Context;
use crate::paths;
use crate::stacks::Deployment;
use crate::ui;

pub fn run(ctx: &Context, deployment: &Deployment, out: Option<&Path>) -> Result<()> {
    let template = deployment.synthesize().map_err(super::explain)?;

    match out {
        Some(out) => {
            let path = paths::expand(&out.to_string_lossy());
            template
                .write(&path)
                .with_context(|| format!("Failed to write template to {}", path.display()))?;
            if !ctx.quiet {
                ui::success(&format!(
                    "Wrote {} resources to {}",
                    template.resources.len(),
                    path.display()
                ));
            }
        }
        None => print!("{}", template.to_json_pretty().map_err(super::explain)?),
    }

    Ok(())
}
