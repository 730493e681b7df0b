use std::collections::BTreeMap;
use std::fmt;

/// Transport specific attributes carried alongside a message.
///
/// A binding attaches whatever it knows about the datagram (for instance a
/// DTLS peer identity or an interface name). The exchange layer passes it
/// through untouched.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TransportContext {
    entries: BTreeMap<String, String>,
}

impl TransportContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}
