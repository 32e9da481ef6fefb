//! Command-line interface for Rangekeeper
//!
//! Uses clap with derive for type-safe CLI parsing

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::net::IpAddr;
use std::path::PathBuf;

/// Rangekeeper - IP address allocation out of a CIDR block
#[derive(Parser)]
#[command(name = "rangekeeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "rangekeeper.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Reserve a specific address
    Allocate {
        /// Address to reserve (e.g., 10.96.0.10)
        ip: IpAddr,
    },

    /// Reserve the next free address and print it
    Next,

    /// Return an address to the pool
    Release {
        /// Address to release
        ip: IpAddr,
    },

    /// Check whether an address is allocated (exit code 1 if not)
    Has {
        /// Address to check
        ip: IpAddr,
    },

    /// List allocated addresses
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show range usage
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Drop all allocations by removing the state file
    Reset,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "rangekeeper", &mut std::io::stdout());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_allocate() {
        let cli = Cli::try_parse_from(["rangekeeper", "-c", "/etc/rk.toml", "allocate", "10.0.0.5"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/rk.toml"));
        match cli.command {
            Commands::Allocate { ip } => assert_eq!(ip, "10.0.0.5".parse::<IpAddr>().unwrap()),
            _ => panic!("expected allocate"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_address() {
        assert!(Cli::try_parse_from(["rangekeeper", "release", "10.0.0.300"]).is_err());
    }
}
