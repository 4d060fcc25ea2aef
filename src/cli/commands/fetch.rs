//! Fetch command - route one request through the worker's fetch handler

use crate::cli::args::FetchArgs;
use crate::cli::commands::open_store;
use crate::config::Config;
use crate::error::{ShellError, ShellResult};
use crate::manifest::PrecacheManifest;
use crate::network::{HttpNetwork, Method, Request};
use crate::ui::{self, UiContext};
use crate::worker::WorkerController;
use std::sync::Arc;
use tokio::fs;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> ShellResult<()> {
    let ctx = UiContext::detect();

    let manifest = PrecacheManifest::from_file(&args.manifest).await?;
    let scope = args.scope.as_deref().unwrap_or(&config.bootstrap.scope);
    let store = open_store(config, scope).await?;
    let network = Arc::new(HttpNetwork::new(&config.network)?);
    let controller = WorkerController::from_config(manifest, store, network, config)?;

    let request = Request::new(Method::parse(&args.method), args.url);
    let route = controller.router().route(&request);
    let served = controller.handle_fetch(request).await?;

    ui::key_value(&ctx, "Strategy", route.strategy_name());
    ui::key_value(&ctx, "Served from", &served.source.to_string());
    ui::key_value(&ctx, "Status", &served.response.status.to_string());
    if let Some(content_type) = served.response.header("content-type") {
        ui::key_value(&ctx, "Content-Type", content_type);
    }
    ui::key_value(&ctx, "Bytes", &served.response.body.len().to_string());

    if let Some(out) = args.output {
        fs::write(&out, &served.response.body)
            .await
            .map_err(|e| ShellError::io(format!("writing response to {}", out.display()), e))?;
        ui::step_ok(&ctx, &format!("Body written to {}", out.display()));
    }
    Ok(())
}
