use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::rng::SeededRng;

/// Retransmission timer for one confirmable message (RFC 7252 §4.2).
///
/// The first timeout is random in `[ack_timeout, ack_timeout * random_factor]`
/// and doubles on every retransmission.
pub(crate) struct RetransmitBackoff {
    rto: Duration,
    left: usize,
}

impl RetransmitBackoff {
    pub fn new(
        ack_timeout: Duration,
        random_factor: f32,
        max_retransmit: usize,
        rng: &mut SeededRng,
    ) -> Self {
        Self {
            rto: ack_timeout.mul_f32(rng.jitter(random_factor)),
            left: max_retransmit,
        }
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    pub fn attempt(&mut self) {
        let (n, overflow) = self.left.overflowing_sub(1);

        if overflow {
            return;
        }

        self.left = n;
        self.rto *= 2;
    }

    pub fn can_retry(&self) -> bool {
        self.left > 0
    }
}

/// An outstanding confirmable message waiting for its ACK.
pub(crate) struct Transaction {
    pub remote: SocketAddr,
    pub message_id: u16,
    pub datagram: Vec<u8>,
    pub backoff: RetransmitBackoff,
    pub deadline: Instant,
}

impl Transaction {
    pub fn new(
        remote: SocketAddr,
        message_id: u16,
        datagram: Vec<u8>,
        backoff: RetransmitBackoff,
        now: Instant,
    ) -> Self {
        let deadline = now + backoff.rto();
        Transaction {
            remote,
            message_id,
            datagram,
            backoff,
            deadline,
        }
    }

    pub fn matches(&self, remote: SocketAddr, message_id: u16) -> bool {
        self.remote == remote && self.message_id == message_id
    }
}
