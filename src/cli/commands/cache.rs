//! Cache command - inspect or clear the cache store

use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::commands::open_store;
use crate::config::Config;
use crate::error::ShellResult;
use crate::store::{CacheEntry, CacheStore, DiskCacheStore};
use crate::ui::{self, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> ShellResult<()> {
    let scope = args.scope.as_deref().unwrap_or(&config.bootstrap.scope);
    let store = open_store(config, scope).await?;

    match args.action {
        CacheAction::List { format } => list_entries(&store, format).await,
        CacheAction::Clear { yes } => clear_entries(&store, yes).await,
    }
}

async fn load_entries(store: &DiskCacheStore) -> ShellResult<Vec<CacheEntry>> {
    let mut entries = Vec::new();
    for key in store.keys().await? {
        if let Some(entry) = store.get(&key).await? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

async fn list_entries(store: &DiskCacheStore, format: OutputFormat) -> ShellResult<()> {
    let entries = load_entries(store).await?;

    match format {
        OutputFormat::Table => print_table(store, &entries).await?,
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.key);
            }
        }
    }
    Ok(())
}

async fn print_table(store: &DiskCacheStore, entries: &[CacheEntry]) -> ShellResult<()> {
    if entries.is_empty() {
        println!("No cached entries in {}.", store.dir().display());
        return Ok(());
    }

    println!(
        "{:<40} {:<6} {:<14} {:>10} {:<16}",
        "KEY", "STATUS", "REVISION", "SIZE", "STORED"
    );
    println!("{}", "-".repeat(90));

    for entry in entries {
        let revision = match &entry.stored_revision {
            Some(rev) => rev.clone(),
            None => style("(hashed)").dim().to_string(),
        };
        println!(
            "{:<40} {:<6} {:<14} {:>10} {:<16}",
            entry.key,
            entry.response.status,
            revision,
            format_size(entry.response.body.len() as u64),
            entry.stored_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!(
        "Total: {} entr(ies), {} in {}",
        entries.len(),
        format_size(store.size_bytes().await?),
        store.store_name()
    );
    Ok(())
}

fn print_json(entries: &[CacheEntry]) -> ShellResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        key: &'a str,
        status: u16,
        revision: Option<&'a str>,
        size: usize,
        stored_at: String,
    }

    let json: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            key: &e.key,
            status: e.response.status,
            revision: e.stored_revision.as_deref(),
            size: e.response.body.len(),
            stored_at: e.stored_at.to_rfc3339(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn clear_entries(store: &DiskCacheStore, yes: bool) -> ShellResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let keys = store.keys().await?;

    if keys.is_empty() {
        ui::step_info(&ctx, "Cache is already empty");
        return Ok(());
    }

    let prompt = format!("Remove {} cached entr(ies) from {}?", keys.len(), store.store_name());
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::outro_warn(&ctx, "Aborted, nothing removed");
        ui::remark(&ctx, "Pass --yes to clear without prompting");
        return Ok(());
    }

    let mut removed = 0;
    for key in &keys {
        if store.delete(key).await? {
            removed += 1;
        }
    }

    ui::outro_success(&ctx, &format!("Removed {} entr(ies)", removed));
    Ok(())
}

/// Format a byte count with a binary unit
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
