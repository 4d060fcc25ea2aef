//! Manifest command - generate a precache manifest from build output

use crate::cli::args::ManifestArgs;
use crate::error::{ShellError, ShellResult};
use crate::manifest::{generate_manifest, GenerateOptions};
use crate::ui::{self, UiContext};
use tokio::fs;

/// Execute the manifest command
pub async fn execute(args: ManifestArgs) -> ShellResult<()> {
    let mut options = GenerateOptions {
        url_prefix: args.prefix,
        ..GenerateOptions::default()
    };
    options.exclude_suffixes.extend(args.exclude);

    let manifest = generate_manifest(&args.dist, &options)?;
    let json = manifest.to_json_pretty()?;

    let Some(out) = args.out else {
        println!("{}", json);
        return Ok(());
    };

    fs::write(&out, format!("{}\n", json))
        .await
        .map_err(|e| ShellError::io(format!("writing manifest to {}", out.display()), e))?;

    let ctx = UiContext::detect();
    let hashed = manifest
        .entries()
        .iter()
        .filter(|entry| entry.is_self_versioned())
        .count();
    ui::step_ok(
        &ctx,
        &format!(
            "Wrote {} entr(ies) to {} ({} content-hashed)",
            manifest.len(),
            out.display(),
            hashed
        ),
    );
    ui::key_value(&ctx, "Fingerprint", &manifest.fingerprint());
    Ok(())
}
