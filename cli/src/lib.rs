use std::{env, path::PathBuf};

use color_eyre::{Result, eyre::eyre};
use log::debug;
use oaktis::{Client, Poller};

pub mod cli;
pub mod commands;
pub mod settings;

use crate::{
    cli::Cli,
    settings::{API_KEY_VAR, BASE_URL_VAR, Settings},
};

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_local_dir()
        .ok_or(eyre!("Couldn't get config dir"))?
        .join("oaktis.ron"))
}

pub fn load_settings() -> Result<Settings> {
    let path = config_path()?;
    let settings = Settings::load(&path)?;
    debug!("Settings from {}: {settings:?}", path.display());
    Ok(settings.unwrap_or_default())
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings()?;
    let config = settings.client_config(&cli, env::var(API_KEY_VAR).ok(), env::var(BASE_URL_VAR).ok())?;
    let client = Client::new(config)?;
    let poller = Poller::new(settings.poll_policy()?);
    commands::run(cli.command, &client, &poller).await
}
