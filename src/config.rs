use std::time::Duration;

use crate::Error;

/// Endpoint configuration
///
/// Transmission parameters default to RFC 7252 §4.8.
#[derive(Debug, Clone)]
pub struct Config {
    ack_timeout: Duration,
    ack_random_factor: f32,
    max_retransmit: usize,
    exchange_lifetime: Duration,
    max_message_size: usize,
    max_queue_tx: usize,
    event_channel: String,
    rng_seed: Option<u64>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            ack_timeout: Duration::from_secs(2),
            ack_random_factor: 1.5,
            max_retransmit: 4,
            exchange_lifetime: Duration::from_secs(247),
            max_message_size: 1152,
            max_queue_tx: 32,
            event_channel: "coap".to_string(),
            rng_seed: None,
        }
    }

    /// Base timeout before the first retransmission of a confirmable message.
    #[inline(always)]
    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// The first timeout is picked from `ack_timeout` to
    /// `ack_timeout * ack_random_factor`.
    #[inline(always)]
    pub fn ack_random_factor(&self) -> f32 {
        self.ack_random_factor
    }

    /// Max number of retransmissions of one confirmable message.
    #[inline(always)]
    pub fn max_retransmit(&self) -> usize {
        self.max_retransmit
    }

    /// How long a message id is remembered for duplicate detection.
    #[inline(always)]
    pub fn exchange_lifetime(&self) -> Duration {
        self.exchange_lifetime
    }

    /// Largest datagram we produce.
    #[inline(always)]
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Max amount of outgoing datagrams to buffer.
    #[inline(always)]
    pub fn max_queue_tx(&self) -> usize {
        self.max_queue_tx
    }

    /// Channel name for structured protocol events.
    #[inline(always)]
    pub fn event_channel(&self) -> &str {
        &self.event_channel
    }

    /// Seed for message ids and retransmission jitter.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}

/// Builder for endpoint configuration.
pub struct ConfigBuilder {
    ack_timeout: Duration,
    ack_random_factor: f32,
    max_retransmit: usize,
    exchange_lifetime: Duration,
    max_message_size: usize,
    max_queue_tx: usize,
    event_channel: String,
    rng_seed: Option<u64>,
}

impl ConfigBuilder {
    /// Set the base retransmission timeout.
    ///
    /// Defaults to 2 seconds.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the random factor applied to the first timeout.
    ///
    /// Must be at least 1.0. Defaults to 1.5.
    pub fn ack_random_factor(mut self, factor: f32) -> Self {
        self.ack_random_factor = factor;
        self
    }

    /// Set the max number of retransmissions.
    ///
    /// Defaults to 4.
    pub fn max_retransmit(mut self, retries: usize) -> Self {
        self.max_retransmit = retries;
        self
    }

    /// Set the duplicate detection window.
    ///
    /// Defaults to 247 seconds.
    pub fn exchange_lifetime(mut self, lifetime: Duration) -> Self {
        self.exchange_lifetime = lifetime;
        self
    }

    /// Set the largest datagram we produce.
    ///
    /// Defaults to 1152.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the max amount of outgoing datagrams to buffer.
    ///
    /// Defaults to 32.
    pub fn max_queue_tx(mut self, max_queue_tx: usize) -> Self {
        self.max_queue_tx = max_queue_tx;
        self
    }

    /// Set the channel name used for protocol events.
    ///
    /// Defaults to `coap`.
    pub fn event_channel(mut self, channel: impl Into<String>) -> Self {
        self.event_channel = channel.into();
        self
    }

    /// Make message ids and jitter deterministic.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` for values outside the protocol limits.
    pub fn build(self) -> Result<Config, Error> {
        if self.ack_random_factor.is_nan() || self.ack_random_factor < 1.0 {
            return Err(Error::ConfigError(format!(
                "ack_random_factor must be >= 1.0: {}",
                self.ack_random_factor
            )));
        }
        if self.ack_timeout.is_zero() {
            return Err(Error::ConfigError("ack_timeout must be > 0".to_string()));
        }
        // Room for at least the fixed header.
        if self.max_message_size < 4 {
            return Err(Error::ConfigError(format!(
                "max_message_size too small: {}",
                self.max_message_size
            )));
        }
        if self.max_queue_tx == 0 {
            return Err(Error::ConfigError("max_queue_tx must be > 0".to_string()));
        }

        Ok(Config {
            ack_timeout: self.ack_timeout,
            ack_random_factor: self.ack_random_factor,
            max_retransmit: self.max_retransmit,
            exchange_lifetime: self.exchange_lifetime,
            max_message_size: self.max_message_size,
            max_queue_tx: self.max_queue_tx,
            event_channel: self.event_channel,
            rng_seed: self.rng_seed,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_rfc7252() {
        let c = Config::default();
        assert_eq!(c.ack_timeout(), Duration::from_secs(2));
        assert_eq!(c.ack_random_factor(), 1.5);
        assert_eq!(c.max_retransmit(), 4);
        assert_eq!(c.exchange_lifetime(), Duration::from_secs(247));
    }

    #[test]
    fn random_factor_below_one_is_rejected() {
        let err = Config::builder().ack_random_factor(0.9).build().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn nan_random_factor_is_rejected() {
        assert!(Config::builder().ack_random_factor(f32::NAN).build().is_err());
    }

    #[test]
    fn zero_queue_is_rejected() {
        assert!(Config::builder().max_queue_tx(0).build().is_err());
    }
}
