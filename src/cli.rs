//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tiersync - tiered snapshot and replication policies
#[derive(Parser, Debug)]
#[command(name = "tiersync")]
#[command(version)]
#[command(about = "Converge tiered snapshot and replication policies on a storage server")]
#[command(
    long_about = "tiersync reads snapshot and replication policies expressed as \"keep N of tier X\" maps and converges the server's periodic snapshot tasks and replication tasks to match them."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Converge every policy in the config file
    Apply {
        /// Policy file (TOML, or YAML by extension)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Report what `apply` would change without changing anything
    Plan {
        /// Policy file (TOML, or YAML by extension)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print the tier catalog
    Tiers,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["tiersync", "apply", "-c", "policies.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Apply { ref config } if config == &PathBuf::from("policies.toml")
        ));
    }

    #[test]
    fn test_plan_requires_config() {
        assert!(Cli::try_parse_from(["tiersync", "plan"]).is_err());
        assert!(Cli::try_parse_from(["tiersync", "plan", "--config", "p.yaml"]).is_ok());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
