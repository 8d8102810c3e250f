//! Command-line arguments.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use wirecall_core::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "wirecall")]
#[command(about = "Invoke a remote function over HTTP")]
pub struct Args {
    /// Remote function name (e.g. getUser)
    pub name: String,

    /// Params as a JSON document (defaults to {})
    pub params: Option<String>,

    /// Build hash of the bundle exposing the function
    #[arg(long)]
    pub hash: String,

    /// Build hash of the caller (defaults to --hash)
    #[arg(long)]
    pub caller_hash: Option<String>,

    /// API base URL, overrides the config file
    #[arg(long)]
    pub api: Option<String>,

    /// Path prefix, overrides the config file
    #[arg(long)]
    pub prefix: Option<String>,

    /// Extra header as NAME:VALUE (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// JSON client config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Splice a hot-reload version tag into the path
    #[arg(long)]
    pub hot_reload: bool,

    /// Version tag to register for this function (implies --hot-reload)
    #[arg(long)]
    pub version_tag: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    /// Merge the config file with command-line overrides.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ClientConfig::default(),
        };

        if let Some(api) = &self.api {
            config.api = api.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            config.headers.insert(name, value);
        }
        if self.hot_reload || self.version_tag.is_some() {
            config.hot_reload = true;
        }

        if config.api.is_empty() {
            bail!("No API base URL: pass --api or set \"api\" in the config file");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn params(&self) -> Result<Option<Value>> {
        self.params
            .as_deref()
            .map(|raw| serde_json::from_str(raw).context("Params are not valid JSON"))
            .transpose()
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => bail!("Header {:?} is not in NAME:VALUE form", raw),
    }
}
