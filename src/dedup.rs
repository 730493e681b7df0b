use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// What the duplicate cache knows about an incoming message id.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Seen {
    /// First time within the lifetime window.
    New,
    /// Seen before, no response sent yet.
    InProgress,
    /// Seen before, this is what we answered.
    Replay(Vec<u8>),
}

struct Entry {
    expires: Instant,
    response: Option<Vec<u8>>,
}

/// Message ids received per peer within `exchange_lifetime` (RFC 7252 §4.5).
///
/// The answer to each is kept so a retransmitted request gets the same
/// response instead of being processed twice.
pub(crate) struct DuplicateCache {
    lifetime: Duration,
    entries: HashMap<(SocketAddr, u16), Entry>,
}

impl DuplicateCache {
    pub fn new(lifetime: Duration) -> Self {
        DuplicateCache {
            lifetime,
            entries: HashMap::new(),
        }
    }

    /// Check the id and remember it if fresh.
    pub fn check_and_insert(&mut self, remote: SocketAddr, message_id: u16, now: Instant) -> Seen {
        if let Some(entry) = self.entries.get(&(remote, message_id)) {
            if entry.expires > now {
                return match &entry.response {
                    Some(datagram) => Seen::Replay(datagram.clone()),
                    None => Seen::InProgress,
                };
            }
        }

        self.entries.insert(
            (remote, message_id),
            Entry {
                expires: now + self.lifetime,
                response: None,
            },
        );
        Seen::New
    }

    /// Store the answer for a known id. Unknown ids are ignored.
    pub fn record_response(&mut self, remote: SocketAddr, message_id: u16, datagram: &[u8]) {
        if let Some(entry) = self.entries.get_mut(&(remote, message_id)) {
            // The first answer is the one the peer may have seen.
            if entry.response.is_none() {
                entry.response = Some(datagram.to_vec());
            }
        }
    }

    pub fn purge(&mut self, now: Instant) {
        self.entries.retain(|_, e| e.expires > now);
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.expires).min()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
