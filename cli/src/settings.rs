use std::{fs, path::Path, time::Duration};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, bail},
};
use indoc::indoc;
use oaktis::{ClientConfig, PollPolicy};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

pub const API_KEY_VAR: &str = "OAKTIS_API_KEY";
pub const BASE_URL_VAR: &str = "OAKTIS_BASE_URL";

const MISSING_KEY_HELP: &str = indoc! {"
    OAKTIS_API_KEY environment variable is required

    Set your API key:
      export OAKTIS_API_KEY=your-api-key"};

/// Optional settings file, see [`crate::config_path`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let src = fs::read_to_string(path)?;
        let settings = ron::from_str(&src)
            .wrap_err_with(|| format!("Invalid settings file {}", path.display()))?;
        Ok(Some(settings))
    }

    /// Later sources win: settings file, then environment, then flags.
    pub fn client_config(
        &self,
        cli: &Cli,
        api_key: Option<String>,
        env_base_url: Option<String>,
    ) -> Result<ClientConfig> {
        let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
            bail!(MISSING_KEY_HELP);
        };

        let mut cfg = ClientConfig::new(api_key);
        if let Some(url) = cli
            .base_url
            .clone()
            .or(env_base_url)
            .or_else(|| self.base_url.clone())
        {
            cfg = cfg.with_base_url(url);
        }
        if let Some(secs) = cli.timeout_secs.or(self.timeout_secs) {
            cfg = cfg.with_timeout(Duration::from_secs(secs));
        }
        Ok(cfg)
    }

    pub fn poll_policy(&self) -> Result<PollPolicy> {
        match self.poll_interval_ms {
            Some(0) => bail!("poll_interval_ms must be greater than zero"),
            Some(ms) => Ok(PollPolicy::fixed(Duration::from_millis(ms))),
            None => Ok(PollPolicy::default()),
        }
    }
}
