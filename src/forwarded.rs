/* src/forwarded.rs */

use crate::addr::{ClientIp, trim_matched};

/// Parse one comma-separated element of a `Forwarded` header and return the address in
/// its `for=` parameter.
///
/// Elements look like `for=192.0.2.60;proto=http;by=203.0.113.43` or
/// `For="[2001:db8:cafe::17%zone]:4711"`. Parameter names are case-insensitive and only
/// the first `for=` is used. Whitespace around `;` and `=` is tolerated, as is an
/// unquoted IPv6 literal, even though RFC 7239 forbids both.
pub fn parse_forwarded_item(item: &str) -> Option<ClientIp> {
    let value = item.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim().eq_ignore_ascii_case("for").then_some(value)
    })?;

    let value = trim_matched(value.trim(), '"', '"');
    if value.is_empty() {
        return None;
    }

    ClientIp::parse(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forwarded_item() {
        let cases = [
            (
                r#"For="[2001:db8:cafe::17]:4711""#,
                Some("2001:db8:cafe::17"),
            ),
            (r#"for="2001:db8:cafe::17""#, Some("2001:db8:cafe::17")),
            ("For=[2001:db8:cafe::17]:4711", Some("2001:db8:cafe::17")),
            (r#"For="[fe80::abcd%zone]:4711""#, Some("fe80::abcd%zone")),
            (r#"For="fe80::abcd%zone""#, Some("fe80::abcd%zone")),
            (r#"fOR="[2001:db8:cafe::17]""#, Some("2001:db8:cafe::17")),
            ("FOR=[2001:db8:cafe::17]", Some("2001:db8:cafe::17")),
            ("FoR=192.0.2.60:4711", Some("192.0.2.60")),
            ("for=192.0.2.60", Some("192.0.2.60")),
            (r#"for="192.0.2.60""#, Some("192.0.2.60")),
            (r#"for="192.0.2.60:4823""#, Some("192.0.2.60")),
            (
                "by=1.1.1.1;for=2.2.2.2;host=myhost;proto=https",
                Some("2.2.2.2"),
            ),
            ("by=1::1;host=myhost;for=2::2;proto=https", Some("2::2")),
            (
                "by=1::1;host=myhost;proto=https;for=2.2.2.2",
                Some("2.2.2.2"),
            ),
            (r#"for="::ffff:188.0.2.128""#, Some("188.0.2.128")),
            (r#"for="[::ffff:188.0.2.128]:49428""#, Some("188.0.2.128")),
            (r#"for="0:0:0:0:0:ffff:bc15:0006""#, Some("188.21.0.6")),
            (r#"for="64:ff9b::188.0.2.128""#, Some("64:ff9b::bc00:280")),
            ("for=127.0.0.1", Some("127.0.0.1")),
            (r#"for="::1""#, Some("::1")),
            (" host=blah ; for = 3.3.3.3 ; proto=https", Some("3.3.3.3")),
            ("for=4.4.4.4;for=5.5.5.5", Some("4.4.4.4")),
            ("for=192.0.2.999", None),
            (r#"for="2001:db8:cafe::999999""#, None),
            (r#"for="_test""#, None),
            ("for=unknown", None),
            ("for=", None),
            (r#"for="""#, None),
            ("proto=https;by=1.1.1.1", None),
            ("1.1.1.1", None),
            ("", None),
            ("ads\x00jkl&#*(383fdljk", None),
        ];

        for (input, want) in cases {
            let got = parse_forwarded_item(input).map(|ip| ip.to_string());
            assert_eq!(got.as_deref(), want, "input {input:?}");
        }
    }
}
