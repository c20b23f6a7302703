//! Bulk parameter randomization command.

use std::path::PathBuf;

use clap::Args;
use rand::SeedableRng;
use rand::rngs::StdRng;

use parche_model::{load_patch, save_patch};

#[derive(Args)]
pub struct RandomizeArgs {
    /// Patch file to randomize and save back
    #[arg(value_name = "PATCH")]
    patch: PathBuf,

    /// Seed for reproducible draws
    #[arg(long)]
    seed: Option<u64>,
}

pub fn run(args: RandomizeArgs) -> anyhow::Result<()> {
    let mut patch = load_patch(&args.patch)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let changed = patch.randomize_parameters(&mut rng);
    save_patch(&mut patch, &args.patch)?;

    println!("Randomized {changed} parameter(s) (frozen parameters untouched)");
    Ok(())
}
