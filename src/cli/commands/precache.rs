//! Precache command - install and activate a manifest into the cache store

use crate::cli::args::PrecacheArgs;
use crate::cli::commands::cache::format_size;
use crate::cli::commands::open_store;
use crate::config::{Config, InstallPolicy};
use crate::error::ShellResult;
use crate::journal::Journal;
use crate::manifest::PrecacheManifest;
use crate::network::HttpNetwork;
use crate::store::CacheStore;
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{Registration, WorkerController};
use std::sync::Arc;
use tracing::debug;

/// Execute the precache command
pub async fn execute(args: PrecacheArgs, config: &Config) -> ShellResult<()> {
    let ctx = UiContext::detect();
    let mut config = config.clone();
    if args.strict {
        config.worker.install_policy = InstallPolicy::Strict;
    } else if args.best_effort {
        config.worker.install_policy = InstallPolicy::BestEffort;
    }

    let manifest = PrecacheManifest::from_file(&args.manifest).await?;
    let total = manifest.len();
    let scope = args.scope.unwrap_or_else(|| config.bootstrap.scope.clone());
    let store = open_store(&config, &scope).await?;
    let network = Arc::new(HttpNetwork::new(&config.network)?);
    debug!(
        "Precaching {} into {} with {} policy",
        args.manifest.display(),
        store.dir().display(),
        config.worker.install_policy
    );

    let controller =
        WorkerController::from_config(manifest, store.clone(), network.clone(), &config)?;
    let generation = controller.generation().to_string();
    let registration = Registration::new(scope, network).with_journal(Journal::new(&config));

    ui::intro(&ctx, "Precache");
    ui::key_value(&ctx, "Origin", &config.network.origin);
    ui::key_value(&ctx, "Generation", &generation);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Installing {} asset(s)...", total));
    if let Err(e) = registration.install(controller).await {
        spinner.stop_error("Install failed, cache left unchanged");
        return Err(e);
    }
    spinner.stop("Installed");

    let id = registration.activate().await?;
    debug!("Worker {} active", id);

    let keys = store.keys().await?;
    let missing = total.saturating_sub(keys.len());
    ui::step_ok(
        &ctx,
        &format!(
            "{} entr(ies) cached ({})",
            keys.len(),
            format_size(store.size_bytes().await?)
        ),
    );
    if missing > 0 {
        ui::step_warn(&ctx, &format!("{} asset(s) skipped", missing));
    }
    ui::outro_success(&ctx, &format!("Scope {} is served cache-first", registration.scope()));
    Ok(())
}
