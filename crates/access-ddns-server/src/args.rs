use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use access_ddns_core::{
    AliasStore, ApiConfig, ApiConnector, ApiToken, KvAliasStore, PolicyUpdater,
    StaticAliasStore, DEFAULT_API_URL,
};
use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::info;

use crate::app::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Keep a Cloudflare Access policy's IP rule pointed at a dynamic address.
#[derive(Debug, Clone, Parser)]
#[command(name = "access-ddns", version, about)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, env = "ACCESS_DDNS_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Cloudflare account owning the Access policies.
    #[arg(long, env = "CLOUDFLARE_ACCOUNT_ID")]
    pub account_id: String,

    /// Cloudflare API base URL.
    #[arg(long, env = "CLOUDFLARE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Timeout for each Cloudflare API call, in seconds.
    #[arg(long, env = "ACCESS_DDNS_TIMEOUT", default_value_t = 30)]
    pub timeout_secs: u64,

    /// YAML file mapping aliases (the `hostname` parameter) to policy ids.
    #[arg(long, env = "ACCESS_DDNS_ALIAS_FILE", conflicts_with = "kv_namespace_id")]
    pub alias_file: Option<PathBuf>,

    /// Workers KV namespace holding the alias table.
    #[arg(long, env = "ACCESS_DDNS_KV_NAMESPACE_ID", requires = "kv_api_token")]
    pub kv_namespace_id: Option<String>,

    /// API token allowed to read the KV namespace.
    #[arg(long, env = "ACCESS_DDNS_KV_API_TOKEN", hide_env_values = true)]
    pub kv_api_token: Option<String>,

    /// Log output format.
    #[arg(long, env = "ACCESS_DDNS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::default()
            .with_url(self.api_url.clone())
            .with_timeout_secs(self.timeout_secs)
    }

    /// Exactly one alias source must be configured.
    pub fn alias_store(&self, connector: &ApiConnector) -> anyhow::Result<Arc<dyn AliasStore>> {
        match (&self.alias_file, &self.kv_namespace_id, &self.kv_api_token) {
            (Some(path), None, _) => {
                let store = StaticAliasStore::from_file(path)?;
                info!(path = %path.display(), aliases = store.len(), "loaded alias file");
                Ok(Arc::new(store))
            }
            (None, Some(namespace), Some(token)) => {
                info!(namespace = %namespace, "using workers kv alias table");
                let client = connector.connect(ApiToken::new(token.clone()));
                Ok(Arc::new(KvAliasStore::new(
                    client,
                    self.account_id.clone(),
                    namespace.clone(),
                )))
            }
            _ => bail!(
                "configure exactly one alias source: --alias-file, or --kv-namespace-id with --kv-api-token"
            ),
        }
    }

    pub fn build_state(&self) -> anyhow::Result<AppState> {
        if self.account_id.trim().is_empty() {
            bail!("CLOUDFLARE_ACCOUNT_ID must not be empty");
        }

        let connector =
            ApiConnector::new(&self.api_config()).context("failed to set up Cloudflare client")?;
        let aliases = self.alias_store(&connector)?;

        Ok(AppState::new(PolicyUpdater::new(
            connector,
            self.account_id.clone(),
            aliases,
        )))
    }
}
