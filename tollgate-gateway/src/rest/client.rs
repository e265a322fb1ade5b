//! Shop API client with optional automatic rate limiting.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tollgate_core::config::{ClientConfig, Credentials, Validatable};
use tollgate_core::types::{CallLimits, ShopName};
use tollgate_telemetry::masking::SensitiveDataMasker;
use tracing::{debug, info, warn};

use super::dispatcher::RateLimitedDispatcher;
use super::quota::{CALL_LIMIT_HEADER, QuotaTracker};
use super::request::{ACCESS_TOKEN_HEADER, ApiRequest, ApiResponse, HttpMethod};
use super::token_bucket::TokenBucket;
use super::transport::{Transport, TransportError};
use crate::error::ClientError;

const USER_AGENT: &str = concat!("tollgate/", env!("CARGO_PKG_VERSION"));

/// Client for one shop's admin API.
///
/// Every response, successful or not, feeds the reported call quota into a
/// [`QuotaTracker`]. With `auto_limit` configured, calls are admitted through
/// a [`RateLimitedDispatcher`] before they reach the transport.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tollgate_core::config::{AutoLimitConfig, ClientConfig};
/// use tollgate_gateway::rest::{HttpMethod, ShopClient};
///
/// let config = ClientConfig::with_access_token("acme", token)
///     .auto_limit(AutoLimitConfig::default());
/// let client = ShopClient::new(config, Arc::new(my_transport))?;
///
/// let products = client.get("/admin/products.json", Some("products")).await?;
/// println!("{}", client.call_limits());
/// ```
pub struct ShopClient {
    config: ClientConfig,
    shop: ShopName,
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    dispatcher: Option<RateLimitedDispatcher>,
    quota: Arc<QuotaTracker>,
    masker: SensitiveDataMasker,
}

impl ShopClient {
    /// Creates a client.
    ///
    /// When auto limiting is configured the client owns a fresh token bucket.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the configuration is invalid.
    ///
    /// # Panics
    ///
    /// Panics if auto limiting is configured and no Tokio runtime is running.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ClientError> {
        config.validate()?;
        let bucket = match &config.auto_limit {
            Some(auto_limit) => Some(Arc::new(TokenBucket::new(auto_limit.bucket)?)),
            None => None,
        };
        Self::build(config, transport, bucket)
    }

    /// Creates a client drawing permits from a shared bucket.
    ///
    /// Clients built from the same bucket share one request budget. The
    /// bucket settings in `auto_limit` are ignored; without `auto_limit` the
    /// bucket is unused.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the configuration is invalid.
    pub fn with_bucket(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        bucket: Arc<TokenBucket>,
    ) -> Result<Self, ClientError> {
        Self::build(config, transport, Some(bucket))
    }

    fn build(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        bucket: Option<Arc<TokenBucket>>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let shop = config.shop()?;
        let credentials = config.credentials()?;

        let dispatcher = match (config.auto_limit, bucket) {
            (Some(auto_limit), Some(bucket)) => {
                Some(RateLimitedDispatcher::new(auto_limit.dispatcher, bucket)?)
            }
            _ => None,
        };

        let masker = SensitiveDataMasker::new();
        let identity = match &credentials {
            Credentials::AccessToken(token) => masker.mask_value(token),
            Credentials::Basic { api_key, .. } => masker.mask_value(api_key),
        };
        info!(
            shop = %shop,
            credential = %identity,
            auto_limit = dispatcher.is_some(),
            "Shop client created"
        );

        Ok(Self {
            config,
            shop,
            credentials,
            transport,
            dispatcher,
            quota: Arc::new(QuotaTracker::new()),
            masker,
        })
    }

    /// Returns the API origin, `https://{shop}.myshopify.com`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("https://{}", self.shop.hostname())
    }

    /// Returns the shop this client talks to.
    #[must_use]
    pub fn shop(&self) -> &ShopName {
        &self.shop
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the dispatcher when auto limiting is enabled.
    #[must_use]
    pub fn dispatcher(&self) -> Option<&RateLimitedDispatcher> {
        self.dispatcher.as_ref()
    }

    /// Builds a stamped request without sending it.
    ///
    /// `params`, when present, become the JSON body, wrapped as
    /// `{key: params}` if a key is given.
    #[must_use]
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        key: Option<&str>,
        params: Option<Value>,
    ) -> ApiRequest {
        let mut headers = vec![("user-agent".to_string(), USER_AGENT.to_string())];
        match &self.credentials {
            Credentials::AccessToken(token) => {
                headers.push((ACCESS_TOKEN_HEADER.to_string(), token.clone()));
            }
            Credentials::Basic { api_key, password } => {
                let encoded = STANDARD.encode(format!("{api_key}:{password}"));
                headers.push(("authorization".to_string(), format!("Basic {encoded}")));
            }
        }

        let body = params.map(|params| match key {
            Some(key) => {
                let mut wrapped = Map::new();
                wrapped.insert(key.to_string(), params);
                Value::Object(wrapped)
            }
            None => params,
        });
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }

        let separator = if path.starts_with('/') { "" } else { "/" };
        ApiRequest {
            method,
            url: format!("{}{separator}{path}", self.base_url()),
            headers,
            body,
            timeout: self.config.request_timeout(),
        }
    }

    /// Sends a request and returns the response body.
    ///
    /// With a key, returns `body[key]` (or `Null` when absent). Without one,
    /// returns the whole body, or an empty object for an empty body.
    ///
    /// # Errors
    ///
    /// - `ClientError::Dispatch` if the call was not admitted or was dropped
    /// - `ClientError::Transport` if the transport failed; the error is the
    ///   transport's own, unchanged
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        key: Option<&str>,
        params: Option<Value>,
    ) -> Result<Value, ClientError> {
        let request = self.build_request(method, path, key, params);
        debug!(
            method = %request.method,
            url = %self.masker.mask_string(&request.url),
            has_body = request.body.is_some(),
            "Sending request"
        );

        let transport = Arc::clone(&self.transport);
        let quota = Arc::clone(&self.quota);
        let exchange = move || async move {
            let result = transport.send(request).await;
            match &result {
                Ok(response) => quota.observe(response.header(CALL_LIMIT_HEADER)),
                Err(e) => quota.observe(e.response_header(CALL_LIMIT_HEADER)),
            }
            result
        };

        let outcome = match &self.dispatcher {
            Some(dispatcher) => dispatcher.submit(exchange)?.await?,
            None => exchange().await,
        };
        let response: ApiResponse = outcome.inspect_err(|e: &TransportError| {
            warn!(method = %method, path, error = %e, "Request failed");
        })?;

        let limits = self.quota.limits();
        debug!(
            status = response.status,
            limits = %limits,
            utilization = limits.utilization(),
            "Request completed"
        );
        Ok(extract_body(response.body, key))
    }

    /// Like [`ShopClient::request`] but decodes the result.
    ///
    /// # Errors
    ///
    /// As [`ShopClient::request`], plus `ClientError::Decode` if the value
    /// does not match `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        key: Option<&str>,
        params: Option<Value>,
    ) -> Result<T, ClientError> {
        let value = self.request(method, path, key, params).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Decode {
            reason: e.to_string(),
        })
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// See [`ShopClient::request`].
    pub async fn get(&self, path: &str, key: Option<&str>) -> Result<Value, ClientError> {
        self.request(HttpMethod::Get, path, key, None).await
    }

    /// Sends a POST request.
    ///
    /// # Errors
    ///
    /// See [`ShopClient::request`].
    pub async fn post(
        &self,
        path: &str,
        key: Option<&str>,
        params: Value,
    ) -> Result<Value, ClientError> {
        self.request(HttpMethod::Post, path, key, Some(params)).await
    }

    /// Sends a PUT request.
    ///
    /// # Errors
    ///
    /// See [`ShopClient::request`].
    pub async fn put(
        &self,
        path: &str,
        key: Option<&str>,
        params: Value,
    ) -> Result<Value, ClientError> {
        self.request(HttpMethod::Put, path, key, Some(params)).await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`ShopClient::request`].
    pub async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        self.request(HttpMethod::Delete, path, None, None).await
    }

    /// Returns the last reported call quota.
    #[must_use]
    pub fn call_limits(&self) -> CallLimits {
        self.quota.limits()
    }

    /// Subscribes to call quota updates.
    #[must_use]
    pub fn subscribe_limits(&self) -> broadcast::Receiver<CallLimits> {
        self.quota.subscribe()
    }
}

impl std::fmt::Debug for ShopClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopClient")
            .field("shop", &self.shop)
            .field("auto_limit", &self.dispatcher.is_some())
            .field("call_limits", &self.quota.limits())
            .finish_non_exhaustive()
    }
}

fn extract_body(body: Value, key: Option<&str>) -> Value {
    match (key, body) {
        (Some(key), Value::Object(mut map)) => map.remove(key).unwrap_or(Value::Null),
        (Some(_), _) => Value::Null,
        (None, Value::Null) => Value::Object(Map::new()),
        (None, body) => body,
    }
}
