//! CoAP header options (RFC 7252 §5.10).
//!
//! Options are kept as raw `(number, value)` pairs ordered by option number,
//! which is also the order they are written to the wire. Typed helpers cover
//! the options a server commonly reads or sets.

use std::fmt;

pub const IF_MATCH: u16 = 1;
pub const URI_HOST: u16 = 3;
pub const ETAG: u16 = 4;
pub const IF_NONE_MATCH: u16 = 5;
pub const URI_PORT: u16 = 7;
pub const LOCATION_PATH: u16 = 8;
pub const URI_PATH: u16 = 11;
pub const CONTENT_FORMAT: u16 = 12;
pub const MAX_AGE: u16 = 14;
pub const URI_QUERY: u16 = 15;
pub const ACCEPT: u16 = 17;
pub const LOCATION_QUERY: u16 = 20;
pub const SIZE2: u16 = 28;
pub const PROXY_URI: u16 = 35;
pub const PROXY_SCHEME: u16 = 39;
pub const SIZE1: u16 = 60;

const RECOGNIZED: &[u16] = &[
    IF_MATCH,
    URI_HOST,
    ETAG,
    IF_NONE_MATCH,
    URI_PORT,
    LOCATION_PATH,
    URI_PATH,
    CONTENT_FORMAT,
    MAX_AGE,
    URI_QUERY,
    ACCEPT,
    LOCATION_QUERY,
    SIZE2,
    PROXY_URI,
    PROXY_SCHEME,
    SIZE1,
];

/// A single option as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOption {
    pub number: u16,
    pub value: Vec<u8>,
}

impl RawOption {
    /// Odd option numbers are critical.
    pub fn is_critical(&self) -> bool {
        self.number & 1 == 1
    }
}

/// The option set of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    items: Vec<RawOption>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// All options in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &RawOption> {
        self.items.iter()
    }

    /// Append an option value, keeping the list ordered by number.
    ///
    /// Values for the same number keep their insertion order.
    pub fn add(&mut self, number: u16, value: impl Into<Vec<u8>>) {
        let idx = self.items.partition_point(|o| o.number <= number);
        self.items.insert(
            idx,
            RawOption {
                number,
                value: value.into(),
            },
        );
    }

    /// Replace all values of `number` with `values`.
    pub fn set<I, V>(&mut self, number: u16, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        self.remove(number);
        for v in values {
            self.add(number, v);
        }
    }

    pub fn remove(&mut self, number: u16) {
        self.items.retain(|o| o.number != number);
    }

    pub fn first(&self, number: u16) -> Option<&[u8]> {
        self.items
            .iter()
            .find(|o| o.number == number)
            .map(|o| o.value.as_slice())
    }

    pub fn get_all(&self, number: u16) -> impl Iterator<Item = &[u8]> {
        self.items
            .iter()
            .filter(move |o| o.number == number)
            .map(|o| o.value.as_slice())
    }

    /// The first critical option this crate does not understand.
    ///
    /// A request carrying one must be rejected with 4.02 Bad Option.
    pub fn first_unrecognized_critical(&self) -> Option<u16> {
        self.items
            .iter()
            .find(|o| o.is_critical() && !RECOGNIZED.contains(&o.number))
            .map(|o| o.number)
    }

    /// Uri-Path rendered as `/a/b`. An absent path is `/`.
    pub fn uri_path(&self) -> String {
        join_segments(self.get_all(URI_PATH), "/", "/")
    }

    /// Set Uri-Path from a `/` separated string.
    pub fn set_uri_path(&mut self, path: &str) {
        self.set(URI_PATH, split_segments(path, '/'));
    }

    /// Uri-Query rendered as `a=1&b=2`.
    pub fn uri_query(&self) -> Option<String> {
        if self.first(URI_QUERY).is_none() {
            return None;
        }
        Some(join_segments(self.get_all(URI_QUERY), "", "&"))
    }

    pub fn set_uri_query(&mut self, query: &str) {
        self.set(URI_QUERY, split_segments(query, '&'));
    }

    pub fn uri_host(&self) -> Option<String> {
        self.first(URI_HOST)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    pub fn set_uri_host(&mut self, host: &str) {
        self.set(URI_HOST, [host.as_bytes()]);
    }

    pub fn uri_port(&self) -> Option<u16> {
        self.first_uint(URI_PORT).map(|v| v as u16)
    }

    pub fn set_uri_port(&mut self, port: u16) {
        self.set_uint(URI_PORT, port as u32);
    }

    pub fn content_format(&self) -> Option<u16> {
        self.first_uint(CONTENT_FORMAT).map(|v| v as u16)
    }

    pub fn set_content_format(&mut self, format: u16) {
        self.set_uint(CONTENT_FORMAT, format as u32);
    }

    pub fn accept(&self) -> Option<u16> {
        self.first_uint(ACCEPT).map(|v| v as u16)
    }

    pub fn set_accept(&mut self, format: u16) {
        self.set_uint(ACCEPT, format as u32);
    }

    pub fn max_age(&self) -> Option<u32> {
        self.first_uint(MAX_AGE)
    }

    pub fn set_max_age(&mut self, seconds: u32) {
        self.set_uint(MAX_AGE, seconds);
    }

    pub fn etag(&self) -> Option<&[u8]> {
        self.first(ETAG)
    }

    pub fn set_etag(&mut self, etag: &[u8]) {
        self.set(ETAG, [etag]);
    }

    pub fn location_path(&self) -> Option<String> {
        self.first(LOCATION_PATH)?;
        Some(join_segments(self.get_all(LOCATION_PATH), "/", "/"))
    }

    pub fn set_location_path(&mut self, path: &str) {
        self.set(LOCATION_PATH, split_segments(path, '/'));
    }

    fn first_uint(&self, number: u16) -> Option<u32> {
        self.first(number).map(decode_uint)
    }

    fn set_uint(&mut self, number: u16, value: u32) {
        self.set(number, [encode_uint(value)]);
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first(URI_PATH).is_some() {
            write!(f, "{}", self.uri_path())?;
        }
        if let Some(q) = self.uri_query() {
            write!(f, "?{}", q)?;
        }
        if let Some(cf) = self.content_format() {
            write!(f, " ct:{}", cf)?;
        }
        Ok(())
    }
}

/// Minimal big endian encoding, zero is the empty value.
pub(crate) fn encode_uint(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

pub(crate) fn decode_uint(value: &[u8]) -> u32 {
    // Longer values are not valid uints, keep the low 4 bytes.
    value[value.len().saturating_sub(4)..]
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn split_segments(s: &str, sep: char) -> Vec<Vec<u8>> {
    s.split(sep)
        .filter(|seg| !seg.is_empty())
        .map(|seg| seg.as_bytes().to_vec())
        .collect()
}

fn join_segments<'a>(segs: impl Iterator<Item = &'a [u8]>, lead: &str, sep: &str) -> String {
    let mut out = String::new();
    for (i, seg) in segs.enumerate() {
        out.push_str(if i == 0 { lead } else { sep });
        out.push_str(&String::from_utf8_lossy(seg));
    }
    if out.is_empty() {
        out.push_str(lead);
    }
    out
}
