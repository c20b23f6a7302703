//! Patch validation command.

use std::path::PathBuf;

use clap::Args;

use parche_graph::validate;
use parche_model::load_patch;

#[derive(Args)]
pub struct ValidateArgs {
    /// Patch file to validate
    #[arg(value_name = "PATCH")]
    patch: PathBuf,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let patch = load_patch(&args.patch)?;
    let errors = validate(&patch);

    if errors.is_empty() {
        println!(
            "OK: {} object(s), {} net(s)",
            patch.object_count(),
            patch.nets().len()
        );
        return Ok(());
    }

    for error in &errors {
        eprintln!("error: {error}");
    }
    anyhow::bail!("{} validation error(s)", errors.len());
}
