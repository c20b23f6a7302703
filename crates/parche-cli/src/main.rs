//! Parche CLI - command-line front end for the parche patcher core.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "parche")]
#[command(author, version, about = "Patch editor core for the parche DSP board", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available object types and their iolets, attributes, parameters
    Objects(commands::objects::ObjectsArgs),

    /// Validate a patch file and report every finding
    Validate(commands::validate::ValidateArgs),

    /// Generate C source and a build manifest from a patch
    Generate(commands::generate::GenerateArgs),

    /// Generate and stream the artifact to a device (loopback dry run)
    Deploy(commands::deploy::DeployArgs),

    /// Randomize every unfrozen parameter and save the patch back
    Randomize(commands::randomize::RandomizeArgs),
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Objects(args) => commands::objects::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Generate(args) => commands::generate::run(args),
        Commands::Deploy(args) => commands::deploy::run(args),
        Commands::Randomize(args) => commands::randomize::run(args),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
}
