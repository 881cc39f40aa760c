//! HTTP front end for `access-ddns-core`.
//!
//! Exposes a single method-agnostic endpoint compatible with router DDNS
//! clients (`/update?ip=...&hostname=...` with Basic auth carrying a
//! Cloudflare API token), plus `/health`.

pub mod app;
pub mod args;
pub mod handler;
pub mod logging;

pub use app::{router, serve, AppState};
pub use args::{Cli, LogFormat};
