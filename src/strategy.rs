/* src/strategy.rs */

use std::fmt;
use std::num::NonZeroUsize;

use tracing::{debug, trace};

use crate::addr::ClientIp;
use crate::error::{ConfigError, Result};
use crate::headers::{HeaderSource, ListHeader, ip_addr_list, last_header_value};
use crate::ranges::{TrustedRanges, is_private_or_local};

/// Validate a header name for a strategy that reads `X-Forwarded-For` or `Forwarded`.
fn list_header(strategy: &'static str, name: &str) -> Result<ListHeader> {
    if name.is_empty() {
        return Err(ConfigError::EmptyHeaderName { strategy });
    }
    ListHeader::from_name(name).ok_or_else(|| ConfigError::NotAListHeader {
        strategy,
        header: name.to_owned(),
    })
}

/// The socket peer address, stripped of its port.
///
/// Use this when the server accepts connections directly from clients rather than
/// through a reverse proxy. Fails only when the peer address is not an IP, such as a
/// Unix domain socket path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteAddr;

impl RemoteAddr {
    pub fn client_ip<H>(&self, _headers: &H, remote_addr: &str) -> Option<ClientIp>
    where
        H: HeaderSource + ?Sized,
    {
        let ip = ClientIp::parse(remote_addr);
        if ip.is_none() {
            trace!(remote_addr, "remote address is not a usable IP");
        }
        ip
    }
}

/// Reads a header that carries exactly one address, such as `X-Real-IP`,
/// `CF-Connecting-IP` or `True-Client-IP`.
///
/// Only use this when the header is set by a trusted reverse proxy and cannot be
/// supplied by the client. If the header is repeated, the last instance wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleIpHeader {
    header: String,
}

impl SingleIpHeader {
    /// `header` must not be empty, `X-Forwarded-For` or `Forwarded`.
    pub fn new(header: &str) -> Result<Self> {
        const STRATEGY: &str = "SingleIpHeader";

        if header.is_empty() {
            return Err(ConfigError::EmptyHeaderName { strategy: STRATEGY });
        }
        if ListHeader::from_name(header).is_some() {
            return Err(ConfigError::ListHeaderNotAllowed {
                strategy: STRATEGY,
                header: header.to_owned(),
            });
        }

        let strategy = Self {
            header: header.to_ascii_lowercase(),
        };
        debug!(%strategy, "configured client IP strategy");
        Ok(strategy)
    }

    /// The lowercase header name.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn client_ip<H>(&self, headers: &H, _remote_addr: &str) -> Option<ClientIp>
    where
        H: HeaderSource + ?Sized,
    {
        let Some(value) = last_header_value(headers, &self.header) else {
            trace!(header = %self.header, "header missing");
            return None;
        };
        let ip = ClientIp::parse(&value);
        if ip.is_none() {
            trace!(header = %self.header, value = %value, "header value is not a usable IP");
        }
        ip
    }
}

/// The leftmost valid, non-private address in `X-Forwarded-For` or `Forwarded`.
///
/// This is the address closest to the client, and it is trivially spoofable: never use
/// it for anything security related (rate limiting, access control). It suits cases
/// like geolocation where a best guess is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeftmostNonPrivate {
    header: ListHeader,
}

impl LeftmostNonPrivate {
    pub fn new(header: &str) -> Result<Self> {
        let strategy = Self {
            header: list_header("LeftmostNonPrivate", header)?,
        };
        debug!(%strategy, "configured client IP strategy");
        Ok(strategy)
    }

    pub fn header(&self) -> ListHeader {
        self.header
    }

    pub fn client_ip<H>(&self, headers: &H, _remote_addr: &str) -> Option<ClientIp>
    where
        H: HeaderSource + ?Sized,
    {
        let ip = ip_addr_list(headers, self.header)
            .into_iter()
            .flatten()
            .find(|ip| !is_private_or_local(ip.ip()));
        if ip.is_none() {
            trace!(header = %self.header, "no valid non-private address in header");
        }
        ip
    }
}

/// The rightmost valid, non-private address in `X-Forwarded-For` or `Forwarded`.
///
/// Use this when every reverse proxy between the internet and the server has a private
/// address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RightmostNonPrivate {
    header: ListHeader,
}

impl RightmostNonPrivate {
    pub fn new(header: &str) -> Result<Self> {
        let strategy = Self {
            header: list_header("RightmostNonPrivate", header)?,
        };
        debug!(%strategy, "configured client IP strategy");
        Ok(strategy)
    }

    pub fn header(&self) -> ListHeader {
        self.header
    }

    pub fn client_ip<H>(&self, headers: &H, _remote_addr: &str) -> Option<ClientIp>
    where
        H: HeaderSource + ?Sized,
    {
        let ip = ip_addr_list(headers, self.header)
            .into_iter()
            .rev()
            .flatten()
            .find(|ip| !is_private_or_local(ip.ip()));
        if ip.is_none() {
            trace!(header = %self.header, "no valid non-private address in header");
        }
        ip
    }
}

/// The address added by the first of a fixed number of trusted reverse proxies.
///
/// Each trusted proxy appends one entry, so with `N` trusted proxies the entry `N`th
/// from the right was written by the outermost one. With a single proxy this is the
/// rightmost entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RightmostTrustedCount {
    header: ListHeader,
    trusted_count: NonZeroUsize,
}

impl RightmostTrustedCount {
    /// `trusted_count` is the number of trusted reverse proxies and must be at least 1.
    pub fn new(header: &str, trusted_count: usize) -> Result<Self> {
        const STRATEGY: &str = "RightmostTrustedCount";

        if header.is_empty() {
            return Err(ConfigError::EmptyHeaderName { strategy: STRATEGY });
        }
        let Some(trusted_count) = NonZeroUsize::new(trusted_count) else {
            return Err(ConfigError::ZeroTrustedCount);
        };
        let strategy = Self {
            header: list_header(STRATEGY, header)?,
            trusted_count,
        };
        debug!(%strategy, "configured client IP strategy");
        Ok(strategy)
    }

    pub fn header(&self) -> ListHeader {
        self.header
    }

    pub fn trusted_count(&self) -> NonZeroUsize {
        self.trusted_count
    }

    pub fn client_ip<H>(&self, headers: &H, _remote_addr: &str) -> Option<ClientIp>
    where
        H: HeaderSource + ?Sized,
    {
        let list = ip_addr_list(headers, self.header);

        let Some(index) = list.len().checked_sub(self.trusted_count.get()) else {
            trace!(
                header = %self.header,
                entries = list.len(),
                trusted_count = self.trusted_count.get(),
                "fewer header entries than trusted proxies"
            );
            return None;
        };

        let ip = list.into_iter().nth(index).flatten();
        if ip.is_none() {
            trace!(header = %self.header, index, "first trusted proxy entry is not a usable IP");
        }
        ip
    }
}

/// The rightmost address that is not in a set of trusted proxy ranges.
///
/// Use this when the address ranges of all reverse proxies in front of the server are
/// known. If a third-party CDN or WAF is among them, verify its access to the origin by
/// something stronger than its address, since anyone can route requests through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightmostTrustedRange {
    header: ListHeader,
    trusted_ranges: TrustedRanges,
}

impl RightmostTrustedRange {
    /// `trusted_ranges` must cover every trusted reverse proxy on the path to this
    /// server. They may be private or public ranges.
    pub fn new(header: &str, trusted_ranges: TrustedRanges) -> Result<Self> {
        let strategy = Self {
            header: list_header("RightmostTrustedRange", header)?,
            trusted_ranges,
        };
        debug!(%strategy, "configured client IP strategy");
        Ok(strategy)
    }

    pub fn header(&self) -> ListHeader {
        self.header
    }

    pub fn trusted_ranges(&self) -> &TrustedRanges {
        &self.trusted_ranges
    }

    pub fn client_ip<H>(&self, headers: &H, _remote_addr: &str) -> Option<ClientIp>
    where
        H: HeaderSource + ?Sized,
    {
        for entry in ip_addr_list(headers, self.header).into_iter().rev() {
            match entry {
                Some(ip) if self.trusted_ranges.contains(ip.ip()) => continue,
                Some(ip) => return Some(ip),
                None => {
                    trace!(header = %self.header, "rightmost untrusted entry is not a usable IP");
                    return None;
                }
            }
        }

        trace!(header = %self.header, "no untrusted address in header");
        None
    }
}

/// Tries each strategy in order and returns the first address found.
///
/// A typical use is a server that is reachable both directly and through a proxy:
/// a header strategy first, then [`RemoteAddr`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    strategies: Vec<Strategy>,
}

impl Chain {
    pub fn new(strategies: impl IntoIterator<Item = Strategy>) -> Self {
        Self {
            strategies: strategies.into_iter().collect(),
        }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn client_ip<H>(&self, headers: &H, remote_addr: &str) -> Option<ClientIp>
    where
        H: HeaderSource + ?Sized,
    {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.client_ip(headers, remote_addr))
    }
}

/// Any one of the client IP strategies.
///
/// Pick the variant that matches the network between the internet and the server. A
/// constructed strategy is immutable and can be shared across threads freely.
///
/// ```rust
/// use real_client_ip::{Headers, RemoteAddr, RightmostNonPrivate, SingleIpHeader, Strategy};
///
/// let strategy = Strategy::chain([
///     SingleIpHeader::new("CF-Connecting-IP").unwrap().into(),
///     RightmostNonPrivate::new("X-Forwarded-For").unwrap().into(),
///     RemoteAddr.into(),
/// ]);
///
/// let headers = Headers::new().with("X-Forwarded-For", "1.1.1.1, 2.2.2.2, 192.168.1.1");
/// let ip = strategy.client_ip(&headers, "192.168.1.2:48212").unwrap();
/// assert_eq!(ip.to_string(), "2.2.2.2");
///
/// let ip = strategy.client_ip(&Headers::new(), "192.168.1.2:48212").unwrap();
/// assert_eq!(ip.to_string(), "192.168.1.2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    RemoteAddr(RemoteAddr),
    SingleIpHeader(SingleIpHeader),
    LeftmostNonPrivate(LeftmostNonPrivate),
    RightmostNonPrivate(RightmostNonPrivate),
    RightmostTrustedCount(RightmostTrustedCount),
    RightmostTrustedRange(RightmostTrustedRange),
    Chain(Chain),
}

impl Strategy {
    /// Shorthand for a [`Chain`] of `strategies`.
    pub fn chain(strategies: impl IntoIterator<Item = Strategy>) -> Self {
        Self::Chain(Chain::new(strategies))
    }

    /// Derive the client IP from the request headers and the raw peer address
    /// (`host`, `host:port`, `[host]:port` or `host%zone`).
    ///
    /// Returns `None` when no address can be derived. Repeated `None` in production
    /// usually means the strategy does not match the actual proxy topology.
    pub fn client_ip<H>(&self, headers: &H, remote_addr: &str) -> Option<ClientIp>
    where
        H: HeaderSource + ?Sized,
    {
        match self {
            Self::RemoteAddr(s) => s.client_ip(headers, remote_addr),
            Self::SingleIpHeader(s) => s.client_ip(headers, remote_addr),
            Self::LeftmostNonPrivate(s) => s.client_ip(headers, remote_addr),
            Self::RightmostNonPrivate(s) => s.client_ip(headers, remote_addr),
            Self::RightmostTrustedCount(s) => s.client_ip(headers, remote_addr),
            Self::RightmostTrustedRange(s) => s.client_ip(headers, remote_addr),
            Self::Chain(s) => s.client_ip(headers, remote_addr),
        }
    }
}

macro_rules! impl_from_strategy {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Strategy {
                fn from(strategy: $variant) -> Self {
                    Self::$variant(strategy)
                }
            }
        )*
    };
}

impl_from_strategy!(
    RemoteAddr,
    SingleIpHeader,
    LeftmostNonPrivate,
    RightmostNonPrivate,
    RightmostTrustedCount,
    RightmostTrustedRange,
    Chain,
);

impl fmt::Display for RemoteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RemoteAddr")
    }
}

impl fmt::Display for SingleIpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingleIpHeader({})", self.header)
    }
}

impl fmt::Display for LeftmostNonPrivate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeftmostNonPrivate({})", self.header)
    }
}

impl fmt::Display for RightmostNonPrivate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RightmostNonPrivate({})", self.header)
    }
}

impl fmt::Display for RightmostTrustedCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            header,
            trusted_count,
        } = self;
        write!(f, "RightmostTrustedCount({header}, {trusted_count})")
    }
}

impl fmt::Display for RightmostTrustedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            header,
            trusted_ranges,
        } = self;
        write!(f, "RightmostTrustedRange({header}, {trusted_ranges})")
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Chain[")?;
        for (i, strategy) in self.strategies.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{strategy}")?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteAddr(s) => fmt::Display::fmt(s, f),
            Self::SingleIpHeader(s) => fmt::Display::fmt(s, f),
            Self::LeftmostNonPrivate(s) => fmt::Display::fmt(s, f),
            Self::RightmostNonPrivate(s) => fmt::Display::fmt(s, f),
            Self::RightmostTrustedCount(s) => fmt::Display::fmt(s, f),
            Self::RightmostTrustedRange(s) => fmt::Display::fmt(s, f),
            Self::Chain(s) => fmt::Display::fmt(s, f),
        }
    }
}
