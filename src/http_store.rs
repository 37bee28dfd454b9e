//! [`RemoteStore`] over the storage server's REST API.
//!
//! Snapshot tasks live under `<base>/pool/snapshottask` and replication
//! tasks under `<base>/replication`. Equality conditions are sent as query
//! parameters; every condition is applied again to the response, since the
//! server does not support prefix filters.

use std::fmt;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;
use tiersync_core::{Error, ResourceId, ResourceKind, Result};
use tiersync_reconciler::store::{Condition, Filter, RemoteStore, StoreError, StoreResult};
use tracing::debug;
use url::Url;

use crate::config::StoreConfig;

/// Collection path of `kind`, relative to the base URL.
const fn endpoint(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::SnapshotTask => "pool/snapshottask",
        ResourceKind::ReplicationTask => "replication",
    }
}

/// Base URL with a trailing slash so relative joins keep its last segment.
fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Query parameter value for an equality condition, if it has one.
fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Blocking REST client for the remote store.
#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl fmt::Debug for HttpStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStore")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "********"))
            .finish_non_exhaustive()
    }
}

impl HttpStore {
    /// Build a client from `config`, reading the bearer token from the
    /// environment variable it names.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the named variable is unset or the client
    /// cannot be built.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let token = config
            .api_key_env
            .as_deref()
            .map(|var| {
                std::env::var(var)
                    .map_err(|_| Error::config(format!("environment variable {var} is not set")))
            })
            .transpose()?;
        Self::with_token(config, token)
    }

    /// Build a client with an explicit token.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the client cannot be built.
    pub fn with_token(config: &StoreConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: normalize_base(config.base_url.clone()),
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn collection_url(&self, kind: ResourceKind) -> StoreResult<Url> {
        self.base_url
            .join(endpoint(kind))
            .map_err(|e| StoreError::invalid_response(format!("bad endpoint URL: {e}")))
    }

    fn item_url(&self, kind: ResourceKind, id: ResourceId) -> StoreResult<Url> {
        self.base_url
            .join(&format!("{}/id/{id}", endpoint(kind)))
            .map_err(|e| StoreError::invalid_response(format!("bad endpoint URL: {e}")))
    }

    /// Collection URL with the equality conditions of `filter` as query
    /// parameters.
    fn query_url(&self, kind: ResourceKind, filter: &Filter) -> StoreResult<Url> {
        let mut url = self.collection_url(kind)?;
        let pairs: Vec<(&str, String)> = filter
            .conditions()
            .iter()
            .filter_map(|condition| match condition {
                Condition::Eq { field, value } => {
                    query_value(value).map(|v| (field.as_str(), v))
                }
                Condition::StartsWith { .. } => None,
            })
            .collect();

        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    fn send(
        &self,
        request: RequestBuilder,
        target: Option<(ResourceKind, ResourceId)>,
    ) -> StoreResult<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        let status = response.status();
        debug!(%status, url = %response.url(), "Remote call answered");

        if status.is_success() {
            return Ok(response);
        }
        if let (StatusCode::NOT_FOUND, Some((kind, id))) = (status, target) {
            return Err(StoreError::NotFound { kind, id });
        }

        let body = response.text().unwrap_or_default();
        Err(StoreError::rejected(format!("HTTP {status}: {}", body.trim())))
    }

    fn json(response: Response) -> StoreResult<Value> {
        response
            .json::<Value>()
            .map_err(|e| StoreError::invalid_response(e.to_string()))
    }
}

impl RemoteStore for HttpStore {
    fn query(&self, kind: ResourceKind, filter: &Filter) -> StoreResult<Vec<Value>> {
        let url = self.query_url(kind, filter)?;
        debug!(%kind, %url, "GET");

        match Self::json(self.send(self.client.get(url), None)?)? {
            Value::Array(records) => Ok(records
                .into_iter()
                .filter(|record| filter.matches(record))
                .collect()),
            other => Err(StoreError::invalid_response(format!(
                "expected a list of {kind} records, got {other}"
            ))),
        }
    }

    fn create(&self, kind: ResourceKind, body: &Value) -> StoreResult<Value> {
        let url = self.collection_url(kind)?;
        debug!(%kind, %url, "POST");
        Self::json(self.send(self.client.post(url).json(body), None)?)
    }

    fn update(&self, kind: ResourceKind, id: ResourceId, body: &Value) -> StoreResult<Value> {
        let url = self.item_url(kind, id)?;
        debug!(%kind, %url, "PUT");
        Self::json(self.send(self.client.put(url).json(body), Some((kind, id)))?)
    }

    fn delete(&self, kind: ResourceKind, id: ResourceId) -> StoreResult<()> {
        let url = self.item_url(kind, id)?;
        debug!(%kind, %url, "DELETE");
        self.send(self.client.delete(url), Some((kind, id)))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn store(base: &str) -> HttpStore {
        let config = StoreConfig {
            base_url: Url::parse(base).unwrap(),
            api_key_env: None,
            timeout: Duration::from_secs(5),
            verify_tls: true,
        };
        HttpStore::with_token(&config, Some("token".to_string())).unwrap()
    }

    #[test]
    fn test_base_url_keeps_last_segment() {
        let with_slash = store("https://nas.local/api/v2.0/");
        let without = store("https://nas.local/api/v2.0");
        assert_eq!(with_slash.base_url(), without.base_url());
        assert_eq!(
            without
                .collection_url(ResourceKind::SnapshotTask)
                .unwrap()
                .as_str(),
            "https://nas.local/api/v2.0/pool/snapshottask"
        );
    }

    #[test]
    fn test_item_url() {
        let url = store("https://nas.local/api/v2.0")
            .item_url(ResourceKind::ReplicationTask, ResourceId::new(7))
            .unwrap();
        assert_eq!(url.as_str(), "https://nas.local/api/v2.0/replication/id/7");
    }

    #[test]
    fn test_query_url_sends_equality_conditions_only() {
        let filter = Filter::new()
            .eq("dataset", "tank/data")
            .starts_with("naming_schema", "auto-");
        let url = store("https://nas.local/api/v2.0")
            .query_url(ResourceKind::SnapshotTask, &filter)
            .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("dataset".to_string(), "tank/data".to_string())]);
    }

    #[test]
    fn test_query_value() {
        assert_eq!(query_value(&json!("a")), Some("a".to_string()));
        assert_eq!(query_value(&json!(3)), Some("3".to_string()));
        assert_eq!(query_value(&json!(true)), Some("true".to_string()));
        assert_eq!(query_value(&json!({"a": 1})), None);
    }

    #[test]
    fn test_missing_token_variable_is_a_config_error() {
        let config = StoreConfig {
            base_url: Url::parse("https://nas.local/api/v2.0").unwrap(),
            api_key_env: Some("TIERSYNC_TEST_UNSET_TOKEN_VARIABLE".to_string()),
            timeout: Duration::from_secs(5),
            verify_tls: true,
        };
        let err = HttpStore::new(&config).err().unwrap();
        assert_eq!(err.kind(), tiersync_core::ErrorKind::Config);
    }

    #[test]
    fn test_debug_hides_token() {
        let printed = format!("{:?}", store("https://nas.local/api/v2.0"));
        assert!(printed.contains("nas.local"));
        assert!(!printed.contains("\"token\""));
    }
}
