//! Client, dispatcher and token bucket configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::traits::{Configurable, Validatable};
use super::validation::{EnvOverride, ValidationContext};
use crate::error::ConfigError;
use crate::types::ShopName;

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = u32::MAX as usize;

/// Token bucket refill policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Maximum tokens held. The bucket starts full.
    #[serde(default = "default_bucket_capacity")]
    pub capacity: u32,
    /// Tokens added per refill tick.
    #[serde(default = "default_refill_amount")]
    pub refill_amount: u32,
    /// Milliseconds between refill ticks.
    #[serde(default = "default_refill_interval_ms")]
    pub refill_interval_ms: u64,
}

fn default_bucket_capacity() -> u32 {
    38
}

fn default_refill_amount() -> u32 {
    2
}

fn default_refill_interval_ms() -> u64 {
    1_000
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            capacity: default_bucket_capacity(),
            refill_amount: default_refill_amount(),
            refill_interval_ms: default_refill_interval_ms(),
        }
    }
}

impl BucketConfig {
    /// Creates a bucket configuration.
    #[must_use]
    pub const fn new(capacity: u32, refill_amount: u32, refill_interval: Duration) -> Self {
        Self {
            capacity,
            refill_amount,
            refill_interval_ms: refill_interval.as_millis() as u64,
        }
    }

    /// Returns the refill interval as a Duration.
    #[must_use]
    pub const fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }

    fn validate_in(&self, ctx: &mut ValidationContext) {
        ctx.positive("capacity", self.capacity)
            .positive("refill_amount", self.refill_amount)
            .positive("refill_interval_ms", self.refill_interval_ms);
    }
}

impl Validatable for BucketConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();
        self.validate_in(&mut ctx);
        ctx.into_result()
    }
}

/// Admission settings for the rate-limited dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum calls considered in flight at once.
    #[serde(default = "default_calls", alias = "calls")]
    pub concurrency_limit: u32,
    /// Milliseconds after a start before its in-flight slot is released.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum calls waiting for a slot.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_calls() -> u32 {
    2
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_calls(),
            interval_ms: default_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl DispatcherConfig {
    /// Creates a dispatcher configuration with an unbounded queue.
    #[must_use]
    pub const fn new(concurrency_limit: u32, release_delay: Duration) -> Self {
        Self {
            concurrency_limit,
            interval_ms: release_delay.as_millis() as u64,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Sets the admission queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Returns the slot release delay.
    #[must_use]
    pub const fn release_delay(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn validate_in(&self, ctx: &mut ValidationContext) {
        ctx.positive("concurrency_limit", self.concurrency_limit)
            .positive("interval_ms", self.interval_ms)
            .positive("queue_capacity", self.queue_capacity);
    }
}

impl Validatable for DispatcherConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();
        self.validate_in(&mut ctx);
        ctx.into_result()
    }
}

/// Automatic request limiting for a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoLimitConfig {
    /// Dispatcher settings.
    #[serde(flatten)]
    pub dispatcher: DispatcherConfig,
    /// Token bucket owned by the client.
    #[serde(default)]
    pub bucket: BucketConfig,
}

impl Validatable for AutoLimitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();
        ctx.scope("auto_limit", |ctx| {
            self.dispatcher.validate_in(ctx);
            ctx.scope("bucket", |ctx| self.bucket.validate_in(ctx));
        });
        ctx.into_result()
    }
}

/// Credentials resolved from a [`ClientConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Persistent OAuth access token.
    AccessToken(String),
    /// Private app key and password.
    Basic {
        /// API key.
        api_key: String,
        /// Private app password.
        password: String,
    },
}

/// Configuration for a shop API client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Shop name; the API host is `{shop_name}.myshopify.com`.
    pub shop_name: String,

    /// Private app API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Private app password.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Persistent OAuth access token.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Enables the rate-limited dispatcher when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_limit: Option<AutoLimitConfig>,
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl ClientConfig {
    /// Creates a configuration authenticated by access token.
    #[must_use]
    pub fn with_access_token(shop_name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            shop_name: shop_name.into(),
            api_key: None,
            password: None,
            access_token: Some(token.into()),
            timeout_ms: default_timeout_ms(),
            auto_limit: None,
        }
    }

    /// Creates a configuration authenticated by API key and password.
    #[must_use]
    pub fn with_basic_auth(
        shop_name: impl Into<String>,
        api_key: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            shop_name: shop_name.into(),
            api_key: Some(api_key.into()),
            password: Some(password.into()),
            access_token: None,
            timeout_ms: default_timeout_ms(),
            auto_limit: None,
        }
    }

    /// Enables automatic limiting.
    #[must_use]
    pub fn auto_limit(mut self, auto_limit: AutoLimitConfig) -> Self {
        self.auto_limit = Some(auto_limit);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Returns the request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the validated shop name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the name is not a valid host label.
    pub fn shop(&self) -> Result<ShopName, ConfigError> {
        ShopName::new(self.shop_name.as_str())
            .map_err(|e| ConfigError::invalid_value("shop_name", e.to_string()))
    }

    /// Resolves the configured credentials.
    ///
    /// Exactly one of an access token or an API key/password pair must be set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` when neither or both kinds are set.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let token = non_empty(self.access_token.as_ref());
        let api_key = non_empty(self.api_key.as_ref());
        let password = non_empty(self.password.as_ref());

        match (token, api_key, password) {
            (Some(token), None, None) => Ok(Credentials::AccessToken(token.to_string())),
            (None, Some(api_key), Some(password)) => Ok(Credentials::Basic {
                api_key: api_key.to_string(),
                password: password.to_string(),
            }),
            _ => Err(ConfigError::ValidationFailed {
                reason: "Missing or invalid options: provide either access_token or both \
                         api_key and password"
                    .to_string(),
            }),
        }
    }
}

impl Validatable for ClientConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();
        ctx.require("shop_name", &self.shop_name)
            .positive("timeout_ms", self.timeout_ms);
        ctx.into_result()?;
        self.shop()?;
        self.credentials()?;
        if let Some(auto_limit) = &self.auto_limit {
            auto_limit.validate()?;
        }
        Ok(())
    }
}

impl Configurable for ClientConfig {
    const ENV_VARS: &'static [&'static str] =
        &["SHOP_NAME", "API_KEY", "PASSWORD", "ACCESS_TOKEN", "TIMEOUT_MS"];

    fn apply_env_overrides(&mut self, env: &EnvOverride) {
        env.string("SHOP_NAME", &mut self.shop_name);
        env.optional("API_KEY", &mut self.api_key);
        env.optional("PASSWORD", &mut self.password);
        env.optional("ACCESS_TOKEN", &mut self.access_token);
        env.number("TIMEOUT_MS", &mut self.timeout_ms);
    }
}
