//! Randomness for message ids and retransmission jitter.
//!
//! With a seed from [`Config`](crate::Config) an endpoint picks the same
//! initial message id and the same timeouts on every run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub(crate) struct SeededRng {
    seeded: Option<StdRng>,
}

impl SeededRng {
    pub fn new(seed: Option<u64>) -> Self {
        SeededRng {
            seeded: seed.map(StdRng::seed_from_u64),
        }
    }

    /// A message id to start counting from (RFC 7252 §4.4).
    pub fn message_id(&mut self) -> u16 {
        match &mut self.seeded {
            Some(rng) => rng.random(),
            None => rand::rng().random(),
        }
    }

    /// Multiplier for ACK_TIMEOUT, uniform in `[1, random_factor]`.
    pub fn jitter(&mut self, random_factor: f32) -> f32 {
        let unit: f32 = match &mut self.seeded {
            Some(rng) => rng.random(),
            None => rand::rng().random(),
        };
        1.0 + unit * (random_factor - 1.0)
    }
}
