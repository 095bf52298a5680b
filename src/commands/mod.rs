//! Subcommand implementations
//!
//! Every command works on an already built [`crate::stacks::Deployment`];
//! none of them contacts the cloud.

pub mod diff;
pub mod list;
pub mod synth;
pub mod validate;

/// Attach the category description and advice to a construction error
pub fn explain(err: declarative::Error) -> anyhow::Error {
    let category = err.category();
    anyhow::Error::new(err).context(format!(
        "{} ({})",
        category.description(),
        category.advice()
    ))
}
