/* src/headers.rs */

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::addr::ClientIp;
use crate::forwarded::parse_forwarded_item;

/// Read access to request headers.
///
/// Implementations must yield every instance of the named header in the order the
/// instances were received; list headers are only meaningful in receipt order. `name` is
/// always passed lowercase.
///
/// Values are text. A source holding raw bytes decodes each value lossily, so bytes that
/// are not UTF-8 spoil only the list items they appear in.
pub trait HeaderSource {
    fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Cow<'a, str>> + 'a;
}

/// An ordered, case-insensitive multi-map of header names to values.
///
/// ```rust
/// use real_client_ip::{HeaderSource, Headers};
///
/// let headers = Headers::new()
///     .with("X-Forwarded-For", "1.1.1.1, 2.2.2.2")
///     .with("x-forwarded-for", "3.3.3.3");
///
/// let values: Vec<_> = headers.header_values("x-forwarded-for").collect();
/// assert_eq!(values, ["1.1.1.1, 2.2.2.2", "3.3.3.3"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header instance after any existing instances of the same name.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Builder form of [`append`](Self::append).
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value);
        }
        headers
    }
}

impl HeaderSource for Headers {
    fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Cow<'a, str>> + 'a {
        self.entries.header_values(name)
    }
}

/// Keys are expected to be lowercase.
impl HeaderSource for HashMap<String, Vec<String>> {
    fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Cow<'a, str>> + 'a {
        self.get(name)
            .into_iter()
            .flat_map(|values| values.iter().map(|v| Cow::Borrowed(v.as_str())))
    }
}

/// Values may carry obs-text bytes. They are decoded lossily so that commas still
/// separate list items and only the affected items fail to parse.
#[cfg(feature = "axum")]
impl HeaderSource for axum::http::HeaderMap {
    fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Cow<'a, str>> + 'a {
        self.get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
    }
}

/// One of the two headers that proxies append to as a comma-separated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListHeader {
    /// `X-Forwarded-For: client, proxy1, proxy2`
    XForwardedFor,
    /// RFC 7239 `Forwarded: for=client;proto=https, for=proxy1`
    Forwarded,
}

impl ListHeader {
    /// Recognize a header name case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("x-forwarded-for") {
            Some(Self::XForwardedFor)
        } else if name.eq_ignore_ascii_case("forwarded") {
            Some(Self::Forwarded)
        } else {
            None
        }
    }

    /// The lowercase name used for lookups.
    pub fn name(self) -> &'static str {
        match self {
            Self::XForwardedFor => "x-forwarded-for",
            Self::Forwarded => "forwarded",
        }
    }

    fn parse_item(self, item: &str) -> Option<ClientIp> {
        match self {
            Self::XForwardedFor => ClientIp::parse(item),
            Self::Forwarded => parse_forwarded_item(item),
        }
    }
}

impl fmt::Display for ListHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::XForwardedFor => "X-Forwarded-For",
            Self::Forwarded => "Forwarded",
        })
    }
}

/// Flatten every instance of a list header into one ordered list of candidates.
///
/// Each comma-separated item yields exactly one entry, `None` when the item does not
/// hold a usable address, so positions stay meaningful for proxy counting.
pub fn ip_addr_list<H>(headers: &H, header: ListHeader) -> Vec<Option<ClientIp>>
where
    H: HeaderSource + ?Sized,
{
    let mut list = Vec::new();
    for value in headers.header_values(header.name()) {
        for item in value.split(',') {
            list.push(header.parse_item(item.trim()));
        }
    }
    list
}

/// The last instance of a header, or `None` if it is absent or empty.
///
/// Single-IP headers should not be repeated; if they are, the last instance is assumed
/// to be the newest.
pub fn last_header_value<'a, H>(headers: &'a H, name: &'a str) -> Option<Cow<'a, str>>
where
    H: HeaderSource + ?Sized,
{
    headers
        .header_values(name)
        .last()
        .filter(|v| !v.is_empty())
}
