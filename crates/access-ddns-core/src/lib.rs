//! Dynamic IP updates for Cloudflare Access policies.
//!
//! A router's DDNS client calls the service with its current WAN address and
//! a policy alias; this crate turns that call into an update of the first IP
//! rule of the matching Access policy:
//!
//! 1. [`extract_credential`] - API token from the `Authorization` header
//! 2. [`extract_request`] - `ip` and `hostname` query parameters
//! 3. [`PolicyUpdater`] - verify token, resolve alias, rewrite, submit
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use access_ddns_core::{
//!     extract_credential, extract_request, ApiConfig, ApiConnector, PolicyUpdater,
//!     StaticAliasStore,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let aliases = StaticAliasStore::from_yaml_str("home.example.com: 6f1c2a7e")?;
//! let connector = ApiConnector::new(&ApiConfig::from_env())?;
//! let updater = PolicyUpdater::new(connector, "account-id", Arc::new(aliases));
//!
//! let token = extract_credential(Some("Basic dXNlcjp0b2tlbg=="))?;
//! let request = extract_request(Some("ip=192.0.2.1&hostname=home.example.com"))?;
//! let outcome = updater.apply(token, &request).await?;
//! println!("updated {}", outcome.policy_name);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `CLOUDFLARE_API_URL` | API base URL (default: `https://api.cloudflare.com/client/v4`) |
//! | `ACCESS_DDNS_TIMEOUT` | Request timeout in seconds (default: 30) |

pub mod alias;
pub mod client;
pub mod credential;
pub mod error;
pub mod policy;
pub mod request;
pub mod types;
pub mod updater;

// Re-export main types
pub use alias::{AliasStore, KvAliasStore, StaticAliasStore};
pub use client::{AccessApi, ApiConnector, CloudflareClient};
pub use credential::{extract_credential, ApiToken};
pub use error::{ApiError, ApiResult, UpdateError, UpdateResult, INTERNAL_ERROR_MESSAGE};
pub use policy::{
    retarget_first_ip_rule, AccessPolicy, AccessRule, IpCondition, IpRule, PolicyPatch,
    RuleRewrite,
};
pub use request::{extract_request, PolicyUpdateRequest, HOSTNAME_PARAM, IP_PARAM};
pub use types::{ApiConfig, PolicyFilter, TokenStatus, DEFAULT_API_URL};
pub use updater::{run_update, PolicyUpdater, UpdateOutcome};
