//! Policy alias lookup (alias → Access policy id).
//!
//! The mapping is maintained outside this service; stores here are read-only.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use crate::client::CloudflareClient;
use crate::error::UpdateResult;

/// Read-only key-value lookup of policy ids by alias.
#[async_trait]
pub trait AliasStore: Send + Sync {
    async fn get(&self, alias: &str) -> UpdateResult<Option<String>>;
}

/// In-memory alias table, usually loaded from a YAML file:
///
/// ```yaml
/// home.example.com: 6f1c2a7e-0000-4000-8000-000000000001
/// office.example.com: 6f1c2a7e-0000-4000-8000-000000000002
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticAliasStore {
    entries: HashMap<String, String>,
}

impl StaticAliasStore {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let entries: HashMap<String, String> =
            serde_yaml::from_str(content).context("alias table must map names to policy ids")?;
        Ok(Self::new(entries))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read alias file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("failed to parse alias file {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for StaticAliasStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl AliasStore for StaticAliasStore {
    async fn get(&self, alias: &str) -> UpdateResult<Option<String>> {
        Ok(self.entries.get(alias).cloned())
    }
}

/// Alias table kept in a Workers KV namespace, read through the REST API
/// with a service-owned token.
#[derive(Debug, Clone)]
pub struct KvAliasStore {
    client: CloudflareClient,
    account_id: String,
    namespace_id: String,
}

impl KvAliasStore {
    pub fn new(
        client: CloudflareClient,
        account_id: impl Into<String>,
        namespace_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            account_id: account_id.into(),
            namespace_id: namespace_id.into(),
        }
    }
}

#[async_trait]
impl AliasStore for KvAliasStore {
    async fn get(&self, alias: &str) -> UpdateResult<Option<String>> {
        let value = self
            .client
            .kv_get(&self.account_id, &self.namespace_id, alias)
            .await?;
        debug!(alias = %alias, found = value.is_some(), "alias lookup");
        Ok(value)
    }
}
