/* src/ranges.rs */

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use crate::addr::canonical;
use crate::error::{ConfigError, Result};

/// A set of network ranges belonging to trusted reverse proxies.
///
/// Built from CIDR literals (`10.0.0.0/8`, `2001:db8::/32`) or bare addresses, which are
/// treated as single-host ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedRanges {
    nets: Vec<IpNet>,
}

impl TrustedRanges {
    /// Parse a list of CIDR ranges and/or bare addresses.
    ///
    /// Zone identifiers are rejected outright: a zoned range is ambiguous and could
    /// never match a candidate carrying that zone anyway.
    ///
    /// ```rust
    /// use real_client_ip::TrustedRanges;
    ///
    /// let ranges = TrustedRanges::parse(["192.168.0.0/16", "3.3.3.3"]).unwrap();
    /// assert!(ranges.contains("192.168.1.1".parse().unwrap()));
    /// assert!(!ranges.contains("3.3.3.4".parse().unwrap()));
    ///
    /// assert!(TrustedRanges::parse(["fe80::1%eth0"]).is_err());
    /// ```
    pub fn parse<I, S>(ranges: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let nets = ranges
            .into_iter()
            .map(|r| parse_range(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { nets })
    }

    /// The parsed networks, in configuration order.
    pub fn nets(&self) -> &[IpNet] {
        &self.nets
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Whether `ip` falls in at least one of the ranges.
    pub fn contains(&self, ip: IpAddr) -> bool {
        contains(&self.nets, ip)
    }
}

impl From<Vec<IpNet>> for TrustedRanges {
    fn from(nets: Vec<IpNet>) -> Self {
        Self {
            nets: nets.into_iter().map(fold_mapped).collect(),
        }
    }
}

impl fmt::Display for TrustedRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, net) in self.nets.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{net}")?;
        }
        f.write_str("]")
    }
}

fn parse_range(r: &str) -> Result<IpNet> {
    if r.contains('%') {
        return Err(ConfigError::ZoneInRange(r.to_owned()));
    }

    let net = if r.contains('/') {
        r.parse::<IpNet>()
            .map_err(|_| ConfigError::InvalidRange(r.to_owned()))?
            .trunc()
    } else {
        let ip = r
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidRange(r.to_owned()))?;
        IpNet::from(canonical(ip))
    };

    Ok(fold_mapped(net))
}

/// Candidates are always canonical IPv4, so an IPv4-mapped IPv6 range has to be
/// expressed as the IPv4 range it covers to ever match.
fn fold_mapped(net: IpNet) -> IpNet {
    let IpNet::V6(v6) = net else {
        return net;
    };
    let Some(v4) = v6.network().to_ipv4_mapped() else {
        return net;
    };
    if v6.prefix_len() < 96 {
        return net;
    }
    Ipv4Net::new(v4, v6.prefix_len() - 96).map_or(net, |n| IpNet::V4(n.trunc()))
}

/// Whether `ip` falls in any of `nets`. Ranges of the other address family never match.
pub(crate) fn contains(nets: &[IpNet], ip: IpAddr) -> bool {
    nets.iter().any(|net| net.contains(&ip))
}

/// Whether `ip` is private, loopback, link-local, reserved, or otherwise not a plausible
/// public client address.
pub fn is_private_or_local(ip: IpAddr) -> bool {
    contains(&PRIVATE_AND_LOCAL_RANGES, canonical(ip))
}

const fn v4(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> IpNet {
    IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::new(a, b, c, d), prefix))
}

const fn v6(segments: [u16; 8], prefix: u8) -> IpNet {
    let [a, b, c, d, e, f, g, h] = segments;
    let addr = Ipv6Addr::new(a, b, c, d, e, f, g, h);
    IpNet::V6(Ipv6Net::new_assert(addr, prefix))
}

static PRIVATE_AND_LOCAL_RANGES: [IpNet; 27] = [
    // RFC 1918
    v4(10, 0, 0, 0, 8),
    v4(172, 16, 0, 0, 12),
    v4(192, 168, 0, 0, 16),
    // RFC 5735 loopback
    v4(127, 0, 0, 0, 8),
    // RFC 1122 "this network"
    v4(0, 0, 0, 0, 8),
    // RFC 3927 link-local
    v4(169, 254, 0, 0, 16),
    // RFC 5736 IETF protocol assignments
    v4(192, 0, 0, 0, 24),
    // RFC 5737 TEST-NET-1
    v4(192, 0, 2, 0, 24),
    // RFC 5737 TEST-NET-2
    v4(198, 51, 100, 0, 24),
    // RFC 5737 TEST-NET-3
    v4(203, 0, 113, 0, 24),
    // RFC 3068 6to4 relay anycast
    v4(192, 88, 99, 0, 24),
    // RFC 2544 benchmarking
    v4(192, 18, 0, 0, 15),
    // RFC 3171 multicast
    v4(224, 0, 0, 0, 4),
    // RFC 1112 reserved
    v4(240, 0, 0, 0, 4),
    // RFC 919 limited broadcast
    v4(255, 255, 255, 255, 32),
    // RFC 6598 carrier-grade NAT
    v4(100, 64, 0, 0, 10),
    // RFC 4291 unspecified
    v6([0, 0, 0, 0, 0, 0, 0, 0], 128),
    // RFC 4291 loopback
    v6([0, 0, 0, 0, 0, 0, 0, 1], 128),
    // RFC 6666 discard
    v6([0x100, 0, 0, 0, 0, 0, 0, 0], 64),
    // RFC 2928 IETF protocol assignments
    v6([0x2001, 0, 0, 0, 0, 0, 0, 0], 23),
    // RFC 5180 benchmarking
    v6([0x2001, 0x2, 0, 0, 0, 0, 0, 0], 48),
    // RFC 3849 documentation
    v6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0], 32),
    // RFC 4380 Teredo
    v6([0x2001, 0, 0, 0, 0, 0, 0, 0], 32),
    // RFC 4193 unique-local
    v6([0xfc00, 0, 0, 0, 0, 0, 0, 0], 7),
    // RFC 4291 link-local
    v6([0xfe80, 0, 0, 0, 0, 0, 0, 0], 10),
    // RFC 4291 multicast
    v6([0xff00, 0, 0, 0, 0, 0, 0, 0], 8),
    // RFC 7526 deprecated 6to4
    v6([0x2002, 0, 0, 0, 0, 0, 0, 0], 16),
];
