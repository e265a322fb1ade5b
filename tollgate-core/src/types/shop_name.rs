//! Shop name type used to derive the per-tenant API host.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Shop name - the tenant label in `{shop}.myshopify.com`.
///
/// Must be non-empty and contain only ASCII alphanumerics and `-`.
///
/// # Examples
///
/// ```
/// use tollgate_core::types::ShopName;
///
/// let shop = ShopName::new("acme-store").unwrap();
/// assert_eq!(shop.hostname(), "acme-store.myshopify.com");
/// assert!(ShopName::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShopName(String);

impl ShopName {
    /// Domain suffix shared by every shop host.
    pub const DOMAIN: &'static str = "myshopify.com";

    /// Creates a new `ShopName`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the name is empty or not a valid host label.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() {
            return Err(ValidationError::EmptyShopName);
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ValidationError::InvalidShopName(s));
        }
        Ok(Self(s))
    }

    /// Returns the shop name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the API host for this shop.
    #[must_use]
    pub fn hostname(&self) -> String {
        format!("{}.{}", self.0, Self::DOMAIN)
    }
}

impl fmt::Display for ShopName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ShopName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ShopName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShopName> for String {
    fn from(value: ShopName) -> Self {
        value.0
    }
}
