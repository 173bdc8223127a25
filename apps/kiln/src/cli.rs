//! Command line interface definition

use clap::{Parser, Subcommand};
use kiln_types::ColorChoice;
use std::path::PathBuf;

/// kiln - manifest-driven package build orchestrator
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build conda-style packages from a kiln.toml manifest and install them")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging and detailed error output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build the project into a package artifact
    Build {
        /// Manifest file or the directory containing kiln.toml
        #[arg(long, value_name = "PATH", default_value = "kiln.toml")]
        manifest_path: PathBuf,

        /// Directory the artifact is written to
        #[arg(long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Number of parallel build jobs (0=auto)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Build the project and install it with its dependencies
    #[command(alias = "i")]
    Install {
        /// Manifest file or the directory containing kiln.toml
        #[arg(long, value_name = "PATH", default_value = "kiln.toml")]
        manifest_path: PathBuf,

        /// Environment root (default: <project>/.kiln/envs/default)
        #[arg(long, value_name = "DIR")]
        env: Option<PathBuf>,

        /// Install pre-built artifacts instead of building the project
        #[arg(long = "artifact", value_name = "FILE")]
        artifacts: Vec<PathBuf>,
    },

    /// Add dependencies to the manifest
    Add {
        /// Package specifications (name or name>=version)
        #[arg(required = true)]
        packages: Vec<String>,

        /// Manifest file or the directory containing kiln.toml
        #[arg(long, value_name = "PATH", default_value = "kiln.toml")]
        manifest_path: PathBuf,

        /// Add as build-time dependencies
        #[arg(long)]
        build: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_accepts_repeated_artifacts() {
        let cli = Cli::try_parse_from([
            "kiln",
            "install",
            "--artifact",
            "a-1.0.0-h0_0.conda",
            "--artifact",
            "b-1.0.0-h0_0.conda",
        ])
        .unwrap();
        match cli.command {
            Commands::Install { artifacts, env, .. } => {
                assert_eq!(artifacts.len(), 2);
                assert!(env.is_none());
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_add_requires_packages() {
        assert!(Cli::try_parse_from(["kiln", "add"]).is_err());
        let cli = Cli::try_parse_from(["kiln", "add", "--build", "cmake>=3.20"]).unwrap();
        assert!(matches!(cli.command, Commands::Add { build: true, .. }));
    }
}
