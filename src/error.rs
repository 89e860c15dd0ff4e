/* src/error.rs */

use thiserror::Error;

/// Result type alias for operations that may fail with `ConfigError`.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while constructing a strategy.
///
/// These only ever surface at setup time. Evaluating a constructed strategy never
/// produces an error; it yields `None` when no client IP can be derived.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The header name was empty.
    #[error("{strategy} header must not be empty")]
    EmptyHeaderName { strategy: &'static str },

    /// A list-based strategy was given something other than `X-Forwarded-For` or `Forwarded`.
    #[error("{strategy}: {header:?} is not a list header")]
    NotAListHeader {
        strategy: &'static str,
        header: String,
    },

    /// A single-IP strategy was given `X-Forwarded-For` or `Forwarded`.
    #[error("{strategy}: {header:?} is a list header")]
    ListHeaderNotAllowed {
        strategy: &'static str,
        header: String,
    },

    /// The trusted proxy count was zero.
    #[error("trusted proxy count must be greater than zero")]
    ZeroTrustedCount,

    /// A trusted range or address carried an IPv6 zone identifier.
    #[error("zones are not allowed in trusted ranges: {0:?}")]
    ZoneInRange(String),

    /// A trusted range or address could not be parsed.
    #[error("invalid trusted range or address: {0:?}")]
    InvalidRange(String),
}

/// Errors from parsing a single address with [`ClientIp::from_str`](crate::ClientIp).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Not an IP address in any accepted textual form.
    #[error("invalid IP address: {0:?}")]
    Invalid(String),

    /// `0.0.0.0` or `::`, which never identify a client.
    #[error("unspecified IP address: {0:?}")]
    Unspecified(String),
}
