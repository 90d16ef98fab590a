// CLI command definitions

use super::initializer::{PreviewCommand, RunCommand, ValidateCommand};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "podpreset-initializer",
    version,
    about = "PodPreset initializer for Kubernetes",
    long_about = "Injects env, env sources, volumes and volume mounts from matching PodPresets into pods waiting on the podpreset initializer"
)]
pub struct CliArgs {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the initializer controller against a cluster
    Run(RunCommand),

    /// Validate PodPreset manifests offline
    Validate(ValidateCommand),

    /// Show which PodPresets select a pod and what the pod would become
    Preview(PreviewCommand),
}
