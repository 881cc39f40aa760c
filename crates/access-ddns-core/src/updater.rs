//! The update workflow: verify token, resolve alias, fetch policy, rewrite
//! the first IP rule, submit.
//!
//! Every step short-circuits on failure. There is no retry and no rollback;
//! the final write is a single remote replace of the policy's `include`
//! list. Concurrent updates of the same policy are not serialized here and
//! the later write wins.

use std::sync::Arc;

use tracing::{info, warn};

use crate::alias::AliasStore;
use crate::client::{AccessApi, ApiConnector};
use crate::credential::ApiToken;
use crate::error::{UpdateError, UpdateResult};
use crate::request::PolicyUpdateRequest;
use crate::types::PolicyFilter;

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub policy_id: String,
    pub policy_name: String,
    pub ip: String,

    /// Index of the rewritten rule within `include`, `None` when the policy
    /// had no IP rule and was submitted unchanged.
    pub rule_index: Option<usize>,
}

/// Applies update requests to one Cloudflare account.
#[derive(Clone)]
pub struct PolicyUpdater {
    connector: ApiConnector,
    account_id: String,
    aliases: Arc<dyn AliasStore>,
}

impl PolicyUpdater {
    pub fn new(
        connector: ApiConnector,
        account_id: impl Into<String>,
        aliases: Arc<dyn AliasStore>,
    ) -> Self {
        Self {
            connector,
            account_id: account_id.into(),
            aliases,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Run the workflow with the caller's token.
    pub async fn apply(
        &self,
        token: ApiToken,
        request: &PolicyUpdateRequest,
    ) -> UpdateResult<UpdateOutcome> {
        let api = self.connector.connect(token);
        run_update(&api, &self.account_id, self.aliases.as_ref(), request).await
    }
}

/// The workflow against any [`AccessApi`] implementation.
pub async fn run_update<A>(
    api: &A,
    account_id: &str,
    aliases: &dyn AliasStore,
    request: &PolicyUpdateRequest,
) -> UpdateResult<UpdateOutcome>
where
    A: AccessApi + ?Sized,
{
    let token = api.verify_token().await?;
    if !token.is_active() {
        return Err(UpdateError::InactiveCredential {
            status: token.status,
        });
    }

    // A missing alias is not an error here; the empty listing below is.
    let policy_id = aliases.get(&request.policy_alias).await?;

    let policies = api
        .list_policies(account_id, &PolicyFilter::by_id(policy_id.clone()))
        .await?;
    let policy = policies
        .into_iter()
        .next()
        .ok_or(UpdateError::PolicyNotFound)?;

    // Only a resolved identifier is ever written.
    let policy_id = policy_id.ok_or_else(|| UpdateError::RemoteService {
        message: format!(
            "no policy identifier for alias {:?}, refusing to update {:?}",
            request.policy_alias, policy.id
        ),
    })?;

    let (patch, rule_index) = policy.retargeted(&request.ip);
    if rule_index.is_none() {
        warn!(
            policy = %policy.name,
            "policy has no ip include rule, submitting it unchanged"
        );
    }

    api.update_policy(account_id, &policy_id, &patch).await?;

    info!(
        policy = %policy.name,
        ip = %request.ip,
        rule_index = ?rule_index,
        "policy {}'s ip include rule updated to {}",
        policy.name,
        request.ip
    );

    Ok(UpdateOutcome {
        policy_id,
        policy_name: policy.name,
        ip: request.ip.clone(),
        rule_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::StaticAliasStore;
    use crate::error::{ApiError, ApiResult};
    use crate::policy::{AccessPolicy, PolicyPatch};
    use crate::types::TokenStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Verify,
        List(Option<String>),
        Update(String, PolicyPatch),
    }

    /// In-memory Access API: stores policies and records calls.
    struct FakeApi {
        status: String,
        policies: Mutex<Vec<AccessPolicy>>,
        calls: Mutex<Vec<Call>>,
        fail_update: bool,
    }

    impl FakeApi {
        fn new(status: &str, policies: Vec<AccessPolicy>) -> Self {
            Self {
                status: status.to_string(),
                policies: Mutex::new(policies),
                calls: Mutex::new(Vec::new()),
                fail_update: false,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn policy(&self, id: &str) -> AccessPolicy {
            self.policies
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .unwrap()
        }
    }

    #[async_trait]
    impl AccessApi for FakeApi {
        async fn verify_token(&self) -> ApiResult<TokenStatus> {
            self.calls.lock().unwrap().push(Call::Verify);
            Ok(TokenStatus {
                id: "tok".into(),
                status: self.status.clone(),
            })
        }

        async fn list_policies(
            &self,
            _account_id: &str,
            filter: &PolicyFilter,
        ) -> ApiResult<Vec<AccessPolicy>> {
            self.calls.lock().unwrap().push(Call::List(filter.id.clone()));
            let policies = self.policies.lock().unwrap();
            Ok(policies
                .iter()
                .filter(|p| filter.id.as_ref().map_or(true, |id| &p.id == id))
                .cloned()
                .collect())
        }

        async fn update_policy(
            &self,
            _account_id: &str,
            policy_id: &str,
            patch: &PolicyPatch,
        ) -> ApiResult<AccessPolicy> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(policy_id.to_string(), patch.clone()));
            if self.fail_update {
                return Err(ApiError::Http {
                    status: 502,
                    message: "bad gateway".into(),
                });
            }
            let mut policies = self.policies.lock().unwrap();
            let policy = policies
                .iter_mut()
                .find(|p| p.id == policy_id)
                .ok_or(ApiError::NotFound {
                    resource: policy_id.to_string(),
                })?;
            policy.name = patch.name.clone();
            policy.decision = patch.decision.clone();
            policy.include = patch.include.clone();
            Ok(policy.clone())
        }
    }

    fn home_policy() -> AccessPolicy {
        AccessPolicy {
            id: "p-home".into(),
            name: "Home network".into(),
            decision: "bypass".into(),
            include: serde_json::from_value(json!([
                {"email": {"email": "me@example.com"}},
                {"ip": {"ip": "203.0.113.9"}},
                {"ip": {"ip": "198.51.100.7"}}
            ]))
            .unwrap(),
        }
    }

    fn aliases() -> StaticAliasStore {
        [("home.example.com".to_string(), "p-home".to_string())]
            .into_iter()
            .collect()
    }

    fn request(ip: &str, alias: &str) -> PolicyUpdateRequest {
        PolicyUpdateRequest {
            ip: ip.to_string(),
            policy_alias: alias.to_string(),
        }
    }

    #[tokio::test]
    async fn test_updates_first_ip_rule_only() {
        let api = FakeApi::new("active", vec![home_policy()]);

        let outcome = run_update(&api, "acc", &aliases(), &request("192.0.2.1", "home.example.com"))
            .await
            .unwrap();

        assert_eq!(outcome.policy_id, "p-home");
        assert_eq!(outcome.policy_name, "Home network");
        assert_eq!(outcome.rule_index, Some(1));

        let stored = api.policy("p-home");
        let before = home_policy();
        assert_eq!(stored.include[0], before.include[0]);
        assert_eq!(stored.include[1].ip_value(), Some("192.0.2.1"));
        assert_eq!(stored.include[2], before.include[2]);
        assert_eq!(stored.name, before.name);
        assert_eq!(stored.decision, before.decision);

        assert_eq!(
            api.calls()[..2],
            [Call::Verify, Call::List(Some("p-home".into()))]
        );
    }

    #[tokio::test]
    async fn test_inactive_token_stops_before_any_other_call() {
        let api = FakeApi::new("disabled", vec![home_policy()]);

        let err = run_update(&api, "acc", &aliases(), &request("192.0.2.1", "home.example.com"))
            .await
            .unwrap_err();

        match err {
            UpdateError::InactiveCredential { status } => assert_eq!(status, "disabled"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(api.calls(), vec![Call::Verify]);
    }

    #[tokio::test]
    async fn test_unknown_alias_with_no_policies_is_not_found() {
        let api = FakeApi::new("active", Vec::new());

        let err = run_update(&api, "acc", &aliases(), &request("192.0.2.1", "nowhere"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::PolicyNotFound));
        assert_eq!(api.calls(), vec![Call::Verify, Call::List(None)]);
    }

    #[tokio::test]
    async fn test_unknown_alias_never_updates_another_policy() {
        let api = FakeApi::new("active", vec![home_policy()]);

        let err = run_update(&api, "acc", &aliases(), &request("192.0.2.1", "typo.example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::RemoteService { .. }));
        assert_eq!(err.status_code(), 500);
        assert_eq!(api.calls(), vec![Call::Verify, Call::List(None)]);
        assert_eq!(api.policy("p-home"), home_policy());
    }

    #[tokio::test]
    async fn test_alias_pointing_at_missing_policy_is_not_found() {
        let api = FakeApi::new("active", vec![home_policy()]);
        let store: StaticAliasStore = [("home.example.com".to_string(), "p-gone".to_string())]
            .into_iter()
            .collect();

        let err = run_update(&api, "acc", &store, &request("192.0.2.1", "home.example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::PolicyNotFound));
    }

    #[tokio::test]
    async fn test_first_of_several_listed_policies_is_used() {
        let mut duplicate = home_policy();
        duplicate.name = "Home network (copy)".into();
        duplicate.include = serde_json::from_value(json!([{"ip": {"ip": "10.0.0.1"}}])).unwrap();
        let api = FakeApi::new("active", vec![home_policy(), duplicate]);

        let outcome = run_update(&api, "acc", &aliases(), &request("192.0.2.1", "home.example.com"))
            .await
            .unwrap();

        assert_eq!(outcome.policy_id, "p-home");
        assert_eq!(outcome.policy_name, "Home network");
        assert_eq!(outcome.rule_index, Some(1));
        match api.calls().last() {
            Some(Call::Update(id, patch)) => {
                assert_eq!(id, "p-home");
                assert_eq!(patch.name, "Home network");
            }
            other => panic!("expected update call, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_policy_without_ip_rule_is_submitted_unchanged() {
        let mut policy = home_policy();
        policy.include = vec![serde_json::from_value(json!({"everyone": {}})).unwrap()];
        let api = FakeApi::new("active", vec![policy.clone()]);

        let outcome = run_update(&api, "acc", &aliases(), &request("192.0.2.1", "home.example.com"))
            .await
            .unwrap();

        assert_eq!(outcome.rule_index, None);
        match api.calls().last() {
            Some(Call::Update(id, patch)) => {
                assert_eq!(id, "p-home");
                assert_eq!(patch.include, policy.include);
            }
            other => panic!("expected update call, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_update_is_idempotent() {
        let api = FakeApi::new("active", vec![home_policy()]);
        let req = request("192.0.2.1", "home.example.com");

        run_update(&api, "acc", &aliases(), &req).await.unwrap();
        let first = api.policy("p-home");
        run_update(&api, "acc", &aliases(), &req).await.unwrap();
        let second = api.policy("p-home");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_submit_is_remote_error() {
        let mut api = FakeApi::new("active", vec![home_policy()]);
        api.fail_update = true;

        let err = run_update(&api, "acc", &aliases(), &request("192.0.2.1", "home.example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::RemoteService { .. }));
        assert_eq!(err.status_code(), 500);
        assert_eq!(api.policy("p-home"), home_policy());
    }

    #[tokio::test]
    async fn test_apply_without_reachable_api_is_remote_error() {
        let connector =
            ApiConnector::new(&crate::types::ApiConfig::default().with_url("http://127.0.0.1:9"))
                .unwrap();
        let updater = PolicyUpdater::new(connector, "acc", Arc::new(aliases()));

        let err = updater
            .apply(ApiToken::new("t"), &request("192.0.2.1", "home.example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::RemoteService { .. }));
        assert_eq!(updater.account_id(), "acc");
    }
}
