/* src/lib.rs */
//! # Real Client IP
//!
//! Strategies for deriving the real client IP address of an HTTP request that may have
//! passed through reverse proxies.
//!
//! Proxies append to `X-Forwarded-For` and `Forwarded`, and clients can put anything
//! they like in those headers before the first proxy sees them. Which entry can be
//! trusted depends entirely on the network between the internet and the server, so
//! instead of one extraction routine this crate offers one strategy per topology:
//!
//! - [`RemoteAddr`]: the socket peer, for servers reached directly.
//! - [`SingleIpHeader`]: a header like `X-Real-IP` or `CF-Connecting-IP` set by a
//!   trusted proxy.
//! - [`RightmostNonPrivate`]: when every proxy has a private address.
//! - [`RightmostTrustedCount`]: when a fixed number of proxies append to the header.
//! - [`RightmostTrustedRange`]: when the proxies' address ranges are known.
//! - [`LeftmostNonPrivate`]: a spoofable best guess, never for security decisions.
//! - [`Chain`]: the first of several strategies that succeeds.
//!
//! Strategies validate their configuration once, at construction. Deriving an address
//! never fails with an error; it returns `None`, which usually means the strategy does
//! not match the actual deployment.
//!
//! ## Features
//!
//! - `axum`: a tower layer and axum extractor, [`RealIpLayer`] and [`RealIp`].
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use real_client_ip::{Headers, RightmostTrustedRange, TrustedRanges};
//!
//! let ranges = TrustedRanges::parse(["192.168.0.0/16", "3.3.3.3"]).unwrap();
//! let strategy = RightmostTrustedRange::new("X-Forwarded-For", ranges).unwrap();
//!
//! let headers = Headers::new()
//!     .with("X-Forwarded-For", "1.1.1.1, 2001:db8:cafe::99%eth0, 3.3.3.3, 192.168.1.1");
//!
//! let ip = strategy.client_ip(&headers, "192.168.1.2:38820");
//! assert_eq!(ip.unwrap().to_string(), "2001:db8:cafe::99%eth0");
//! ```

pub mod addr;
pub mod config;
pub mod error;
pub mod forwarded;
pub mod headers;
pub mod ranges;
pub mod strategy;

#[cfg(feature = "axum")]
pub mod middleware;

pub use addr::ClientIp;
pub use config::StrategyConfig;
pub use error::{AddressError, ConfigError, Result};
pub use headers::{HeaderSource, Headers, ListHeader};
pub use ranges::{TrustedRanges, is_private_or_local};
pub use strategy::{
    Chain, LeftmostNonPrivate, RemoteAddr, RightmostNonPrivate, RightmostTrustedCount,
    RightmostTrustedRange, SingleIpHeader, Strategy,
};

#[cfg(feature = "axum")]
pub use middleware::{MissingRealIp, RealIp, RealIpLayer, RealIpService};
