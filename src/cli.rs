use crate::config::Variant;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bastion")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Synthesize a bastion deployment unit into a CloudFormation template", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ~/.config/bastion/config.toml)
    #[arg(short, long, global = true, env = "BASTION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target account id
    #[arg(long, global = true, env = "CDK_ACCOUNT", hide_env_values = true)]
    pub account: Option<String>,

    /// Target region
    #[arg(long, global = true, env = "CDK_REGION")]
    pub region: Option<String>,

    /// Which unit to build (overrides the config file)
    #[arg(long, global = true, value_enum)]
    pub variant: Option<Variant>,

    /// Unit name (overrides the config file)
    #[arg(long, global = true)]
    pub stack_name: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print or write the synthesized template
    Synth {
        /// Write the template to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List declared resources
    List {
        /// Filter: type (e.g. "ec2", "network", "rds") or type.name
        target: Option<String>,
    },

    /// Compare with a previously synthesized template
    Diff {
        /// Template to compare against
        #[arg(long)]
        against: PathBuf,
    },

    /// Build the unit, run all checks and report exposure warnings
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_synth_with_overrides() {
        let cli = Cli::try_parse_from([
            "bastion",
            "--account",
            "123456789012",
            "--region",
            "eu-west-1",
            "--variant",
            "bastion-db",
            "synth",
            "--out",
            "out.json",
        ])
        .unwrap();

        assert_eq!(cli.account.as_deref(), Some("123456789012"));
        assert_eq!(cli.variant, Some(Variant::BastionDb));
        match cli.command {
            Command::Synth { out } => assert_eq!(out, Some(PathBuf::from("out.json"))),
            _ => panic!("expected synth"),
        }
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["bastion", "-vv", "validate"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_dotenv_values_fill_account_and_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "CDK_ACCOUNT=210987654321\nCDK_REGION=ap-south-1\n").unwrap();
        dotenvy::from_path_override(&path).unwrap();

        let cli = Cli::try_parse_from(["bastion", "validate"]).unwrap();
        assert_eq!(cli.account.as_deref(), Some("210987654321"));
        assert_eq!(cli.region.as_deref(), Some("ap-south-1"));
    }

    #[test]
    fn test_diff_requires_against() {
        assert!(Cli::try_parse_from(["bastion", "diff"]).is_err());
    }
}
