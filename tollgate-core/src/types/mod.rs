//! Value types shared across Tollgate crates.
//!
//! - [`CallLimits`] - Server-reported API call usage
//! - [`ShopName`] - Validated shop identifier used to derive the API host

mod call_limits;
mod shop_name;

pub use call_limits::CallLimits;
pub use shop_name::ShopName;

/// Validation error for `NewType` construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Shop name is empty
    #[error("shop name cannot be empty")]
    EmptyShopName,

    /// Shop name contains characters not allowed in a host label
    #[error("invalid shop name: {0}")]
    InvalidShopName(String),
}
