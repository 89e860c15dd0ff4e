/* src/addr.rs */

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::AddressError;

/// A client IP address in canonical form, with an optional IPv6 zone identifier.
///
/// A `ClientIp` never holds an unspecified address (`0.0.0.0` or `::`), and IPv4-mapped
/// IPv6 addresses are always stored as plain IPv4, so its `Display` output is stable
/// across repeated parse/print round trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIp {
    ip: IpAddr,
    zone: Option<String>,
}

impl ClientIp {
    /// Parse an address that may carry a port, surrounding brackets, and/or a `%zone`.
    ///
    /// Accepts `host`, `host:port`, `[host]:port`, `[host]` and `host%zone` forms. Returns
    /// `None` for anything that is not a usable client address.
    ///
    /// ```rust
    /// use real_client_ip::ClientIp;
    ///
    /// let ip = ClientIp::parse("[fe80::abcd%eth0]:4711").unwrap();
    /// assert_eq!(ip.to_string(), "fe80::abcd%eth0");
    ///
    /// let ip = ClientIp::parse("::ffff:188.0.2.128").unwrap();
    /// assert_eq!(ip.to_string(), "188.0.2.128");
    ///
    /// assert!(ClientIp::parse("0.0.0.0").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// The numeric address.
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// The zone identifier, if one was present.
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }
}

impl FromStr for ClientIp {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A bare IPv6 address has too many colons to split; that failure is expected and
        // the original text is parsed as-is.
        let host = split_host_port(s).unwrap_or(s);
        let host = trim_matched(host, '[', ']');
        let (host, zone) = split_host_zone(host);

        let ip = host
            .parse::<IpAddr>()
            .map_err(|_| AddressError::Invalid(s.to_owned()))?;
        let ip = canonical(ip);

        if ip.is_unspecified() {
            return Err(AddressError::Unspecified(s.to_owned()));
        }

        Ok(Self {
            ip,
            zone: zone.filter(|z| !z.is_empty()).map(str::to_owned),
        })
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.zone {
            Some(zone) => write!(f, "{}%{}", self.ip, zone),
            None => write!(f, "{}", self.ip),
        }
    }
}

impl From<ClientIp> for IpAddr {
    fn from(ip: ClientIp) -> Self {
        ip.ip
    }
}

/// Collapse IPv4-mapped IPv6 (`::ffff:a.b.c.d`) to plain IPv4.
pub(crate) fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}

/// Split `host:port` or `[host]:port`, returning the host. The port is not validated.
fn split_host_port(s: &str) -> Option<&str> {
    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let end = rest.find(']')?;
        let port = rest[end + 1..].strip_prefix(':')?;
        (&rest[..end], port)
    } else {
        let (host, port) = s.rsplit_once(':')?;
        if host.contains(':') {
            return None;
        }
        (host, port)
    };

    if host.contains(['[', ']']) || port.contains(['[', ']']) {
        return None;
    }
    Some(host)
}

/// Split `host%zone` at the last `%`. A leading `%` is not a zone separator.
fn split_host_zone(s: &str) -> (&str, Option<&str>) {
    match s.rfind('%') {
        Some(i) if i > 0 => (&s[..i], Some(&s[i + 1..])),
        _ => (s, None),
    }
}

/// Trim `s` only if it both starts with `first` and ends with `last`.
pub(crate) fn trim_matched(s: &str, first: char, last: char) -> &str {
    if s.len() < 2 {
        return s;
    }
    s.strip_prefix(first)
        .and_then(|inner| inner.strip_suffix(last))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(s: &str) -> Option<String> {
        ClientIp::parse(s).map(|ip| ip.to_string())
    }

    #[test]
    fn test_parse_forms() {
        let cases = [
            ("192.0.2.60", Some("192.0.2.60")),
            ("192.0.2.60:4833", Some("192.0.2.60")),
            ("2001:db8:cafe::17", Some("2001:db8:cafe::17")),
            ("[2001:db8:cafe::17]:4711", Some("2001:db8:cafe::17")),
            ("[2001:db8:cafe::17]", Some("2001:db8:cafe::17")),
            ("fe80::abcd%zone", Some("fe80::abcd%zone")),
            ("[fe80::abcd%zone]:4711", Some("fe80::abcd%zone")),
            ("[fe80::abcd%eth0]:xyz", Some("fe80::abcd%eth0")),
            ("1.1.1.1%", Some("1.1.1.1")),
            ("127.0.0.1", Some("127.0.0.1")),
            ("::1", Some("::1")),
            ("nope%zone", None),
            ("nope!!", None),
            ("%eth0", None),
            ("fe80::1%a%b", None),
            ("192.0.2.999", None),
            ("2001:db8:cafe::999999", None),
            ("", None),
            ("ads\x00jkl&#*(383fdljk", None),
        ];

        for (input, want) in cases {
            assert_eq!(parsed(input).as_deref(), want, "input {input:?}");
        }
    }

    #[test]
    fn test_rejects_unspecified() {
        assert_eq!(
            "0.0.0.0".parse::<ClientIp>(),
            Err(AddressError::Unspecified("0.0.0.0".into()))
        );
        assert_eq!(
            "::".parse::<ClientIp>(),
            Err(AddressError::Unspecified("::".into()))
        );
        assert!(ClientIp::parse("[::]:80").is_none());
        assert!(ClientIp::parse("::ffff:0.0.0.0").is_none());
    }

    #[test]
    fn test_ipv4_mapped_normalizes() {
        assert_eq!(parsed("::ffff:188.0.2.128").as_deref(), Some("188.0.2.128"));
        assert_eq!(
            parsed("[::ffff:188.0.2.128]:48483").as_deref(),
            Some("188.0.2.128")
        );
        assert_eq!(parsed("::ffff:bc15:0006").as_deref(), Some("188.21.0.6"));
        assert_eq!(
            parsed("0:0:0:0:0:ffff:bc15:0006").as_deref(),
            Some("188.21.0.6")
        );
        assert_eq!(
            ClientIp::parse("::ffff:bc15:0006"),
            ClientIp::parse("188.21.0.6")
        );
    }

    #[test]
    fn test_ipv6_keeps_own_form() {
        assert_eq!(
            parsed("[64:ff9b::188.0.2.128]:4747").as_deref(),
            Some("64:ff9b::bc00:280")
        );
        assert_eq!(
            parsed("[2002:c000:204::]:4747").as_deref(),
            Some("2002:c000:204::")
        );
        assert_eq!(
            parsed("2001:0db8:0000:0000:0000:0000:0000:0001").as_deref(),
            Some("2001:db8::1")
        );
    }

    #[test]
    fn test_display_round_trip_is_stable() {
        for input in [
            "1.1.1.1",
            "::ffff:172.21.0.6",
            "2001:db8:cafe::17",
            "fe80::382b:141b:fa4a:2a16%28",
            "[64:ff9b::188.0.2.128]:4747",
        ] {
            let once = parsed(input).unwrap();
            assert_eq!(parsed(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn test_zone_is_kept_separately() {
        let ip = ClientIp::parse("fe80::abcd%eth0").unwrap();
        assert_eq!(ip.ip(), "fe80::abcd".parse::<IpAddr>().unwrap());
        assert_eq!(ip.zone(), Some("eth0"));
        assert_ne!(ip, ClientIp::parse("fe80::abcd").unwrap());
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("1.2.3.4:80"), Some("1.2.3.4"));
        assert_eq!(split_host_port("1.2.3.4:"), Some("1.2.3.4"));
        assert_eq!(split_host_port("[::1]:80"), Some("::1"));
        assert_eq!(split_host_port("::1"), None);
        assert_eq!(split_host_port("[::1]"), None);
        assert_eq!(split_host_port("1.2.3.4"), None);
        assert_eq!(split_host_port("[[::1]:80"), None);
    }

    #[test]
    fn test_trim_matched() {
        assert_eq!(trim_matched("\"x\"", '"', '"'), "x");
        assert_eq!(trim_matched("\"x", '"', '"'), "\"x");
        assert_eq!(trim_matched("\"", '"', '"'), "\"");
        assert_eq!(trim_matched("[::1]", '[', ']'), "::1");
        assert_eq!(trim_matched("]::1[", '[', ']'), "]::1[");
    }
}
