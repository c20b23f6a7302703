//! Code generation command.

use std::fs;
use std::path::PathBuf;

use clap::Args;

use parche_codegen::{GenResult, generate};
use parche_graph::resolve;
use parche_model::{Patch, load_patch};

#[derive(Args)]
pub struct GenerateArgs {
    /// Patch file to generate from
    #[arg(value_name = "PATCH")]
    patch: PathBuf,

    /// Directory to write patch.c and manifest.json into
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

pub fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let patch = load_patch(&args.patch)?;
    let result = generate_checked(&patch)?;

    fs::create_dir_all(&args.output)?;
    let source_path = args.output.join("patch.c");
    let manifest_path = args.output.join("manifest.json");
    fs::write(&source_path, &result.source)?;
    fs::write(
        &manifest_path,
        serde_json::to_string_pretty(&result.manifest)?,
    )?;

    println!(
        "Generated {} ({} bytes) and {} ({} object(s), {} parameter(s))",
        source_path.display(),
        result.source.len(),
        manifest_path.display(),
        result.manifest.objects.len(),
        result.manifest.param_count
    );
    Ok(())
}

/// Resolve and generate, surfacing every finding before bailing.
pub fn generate_checked(patch: &Patch) -> anyhow::Result<GenResult> {
    let order = match resolve(patch) {
        Ok(order) => order,
        Err(errors) => {
            for error in &errors {
                eprintln!("error: {error}");
            }
            anyhow::bail!("{} validation error(s)", errors.len());
        }
    };
    let result = generate(patch, &order, None);
    if !result.errors.is_empty() {
        for error in &result.errors {
            eprintln!("error: {error}");
        }
        anyhow::bail!("{} code generation error(s)", result.errors.len());
    }
    Ok(result)
}
