//! Cloudflare Access policy model and the IP rule rewrite.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An Access policy as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Policy UUID.
    #[serde(default)]
    pub id: String,

    /// Display name.
    pub name: String,

    /// `allow`, `deny`, `bypass` or `non_identity`. Passed through verbatim.
    pub decision: String,

    /// Rules of which at least one must match.
    #[serde(default)]
    pub include: Vec<AccessRule>,
}

/// One entry of a policy's `include` list.
///
/// Only the IP capability is understood; every other rule shape is kept as
/// raw JSON so it round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccessRule {
    /// `{"ip": {"ip": "203.0.113.9/32"}}`, or any rule whose `ip` is an
    /// object, even one without an address yet.
    Ip(IpRule),

    /// Any other rule (`email`, `everyone`, `group`, ...).
    Other(Map<String, Value>),
}

/// Rule carrying an `ip` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpRule {
    pub ip: IpCondition,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `ip` condition body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpCondition {
    /// Address or CIDR range. Absent or `null` still marks the rule as the
    /// IP capability; the rewrite fills it in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessRule {
    /// Rule matching a single IP or range.
    pub fn ip(ip: impl Into<String>) -> Self {
        Self::Ip(IpRule {
            ip: IpCondition {
                ip: Some(ip.into()),
                extra: Map::new(),
            },
            extra: Map::new(),
        })
    }

    pub fn has_ip(&self) -> bool {
        matches!(self, Self::Ip(_))
    }

    /// The IP value, if this is an IP rule.
    pub fn ip_value(&self) -> Option<&str> {
        match self {
            Self::Ip(rule) => rule.ip.ip.as_deref(),
            Self::Other(_) => None,
        }
    }
}

/// Body of the policy update call. `include` is replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyPatch {
    pub name: String,
    pub decision: String,
    pub include: Vec<AccessRule>,
}

/// Result of [`retarget_first_ip_rule`].
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRewrite {
    pub include: Vec<AccessRule>,

    /// Index of the rewritten rule; `None` when no IP rule exists.
    pub index: Option<usize>,
}

/// Point the first IP rule at `ip`.
///
/// Returns a new list in which at most one element differs from `include`:
/// the first rule (in list order) with an IP capability. Rules after it and
/// rules without the capability are copied unchanged.
pub fn retarget_first_ip_rule(include: &[AccessRule], ip: &str) -> RuleRewrite {
    let index = include.iter().position(AccessRule::has_ip);

    let mut rules = include.to_vec();
    if let Some(AccessRule::Ip(rule)) = index.and_then(|i| rules.get_mut(i)) {
        rule.ip.ip = Some(ip.to_string());
    }

    RuleRewrite {
        include: rules,
        index,
    }
}

impl AccessPolicy {
    /// Patch that keeps name and decision and retargets the first IP rule.
    pub fn retargeted(&self, ip: &str) -> (PolicyPatch, Option<usize>) {
        let rewrite = retarget_first_ip_rule(&self.include, ip);
        let patch = PolicyPatch {
            name: self.name.clone(),
            decision: self.decision.clone(),
            include: rewrite.include,
        };
        (patch, rewrite.index)
    }
}
