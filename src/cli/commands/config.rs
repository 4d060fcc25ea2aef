//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::ShellResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> ShellResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }
    Ok(())
}

fn show_config(config: &Config) -> ShellResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ShellResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn(&ctx, &format!("Config already exists at {}", path.display()));
        ui::remark(&ctx, "Use --force to overwrite");
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok(&ctx, &format!("Configuration initialized at {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::locate(Some(dir.path().join("config.toml")));

        init_config(&manager, false).await.unwrap();
        let mut config = manager.load().await.unwrap();
        assert_eq!(config.worker.cache_name, "trellis-precache-v1");

        config.worker.cache_name = "custom".to_string();
        manager.save(&config).await.unwrap();

        init_config(&manager, false).await.unwrap();
        assert_eq!(manager.load().await.unwrap().worker.cache_name, "custom");

        init_config(&manager, true).await.unwrap();
        assert_eq!(
            manager.load().await.unwrap().worker.cache_name,
            "trellis-precache-v1"
        );
    }
}
