//! Structured protocol events.
//!
//! Events are `(category, peer address, details)` triples rendered by an
//! [`EventFormatter`] and emitted through the `log` facade with target
//! `eventlog.<channel>`. A handle is either active or disabled; the choice is
//! made when the handle is created and a disabled handle does nothing but a
//! variant check.
//!
//! ```
//! use coapex::eventlog::{EventLogger, PlainFormatter, COAP_SENT};
//!
//! static FORMATTER: PlainFormatter = PlainFormatter;
//!
//! let events = EventLogger::with_formatter("coap", &FORMATTER);
//! events.info(COAP_SENT, None, &"CON GET MID:1");
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use log::Level;
use once_cell::sync::OnceCell;

pub const COAP_RECEIVED: &str = "CoAP received";
pub const COAP_SENT: &str = "CoAP sent";

const TARGET_PREFIX: &str = "eventlog.";

/// Renders one event into a log line.
///
/// Implementations must not panic; the protocol code does not guard against
/// it.
pub trait EventFormatter: Send + Sync {
    fn format(&self, category: &str, address: Option<SocketAddr>, details: &dyn fmt::Display)
        -> String;
}

/// `category [address] details`
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormatter;

impl EventFormatter for PlainFormatter {
    fn format(
        &self,
        category: &str,
        address: Option<SocketAddr>,
        details: &dyn fmt::Display,
    ) -> String {
        match address {
            Some(addr) => format!("{} [{}] {}", category, addr, details),
            None => format!("{} [-] {}", category, details),
        }
    }
}

static DEFAULT_FORMATTER: OnceCell<&'static dyn EventFormatter> = OnceCell::new();

/// Install the process wide formatter used by [`EventLogger::new`].
///
/// Can only be done once. A second call hands back the rejected formatter.
pub fn install_default_formatter(
    formatter: &'static dyn EventFormatter,
) -> Result<(), &'static dyn EventFormatter> {
    DEFAULT_FORMATTER.set(formatter)
}

/// Handle for emitting events on one channel.
#[derive(Clone)]
pub enum EventLogger {
    Active {
        target: Arc<str>,
        formatter: &'static dyn EventFormatter,
    },
    Disabled,
}

impl EventLogger {
    /// Handle for `channel` using the installed default formatter.
    ///
    /// Disabled when no default formatter is installed.
    pub fn new(channel: &str) -> Self {
        match DEFAULT_FORMATTER.get() {
            Some(formatter) => Self::with_formatter(channel, *formatter),
            None => EventLogger::Disabled,
        }
    }

    pub fn with_formatter(channel: &str, formatter: &'static dyn EventFormatter) -> Self {
        EventLogger::Active {
            target: format!("{}{}", TARGET_PREFIX, channel).into(),
            formatter,
        }
    }

    pub fn disabled() -> Self {
        EventLogger::Disabled
    }

    pub fn is_active(&self) -> bool {
        matches!(self, EventLogger::Active { .. })
    }

    pub fn fatal(&self, category: &str, address: Option<SocketAddr>, details: &dyn fmt::Display) {
        self.emit(Level::Error, category, address, details);
    }

    pub fn error(&self, category: &str, address: Option<SocketAddr>, details: &dyn fmt::Display) {
        self.emit(Level::Error, category, address, details);
    }

    pub fn warn(&self, category: &str, address: Option<SocketAddr>, details: &dyn fmt::Display) {
        self.emit(Level::Warn, category, address, details);
    }

    pub fn info(&self, category: &str, address: Option<SocketAddr>, details: &dyn fmt::Display) {
        self.emit(Level::Info, category, address, details);
    }

    fn emit(
        &self,
        level: Level,
        category: &str,
        address: Option<SocketAddr>,
        details: &dyn fmt::Display,
    ) {
        let EventLogger::Active { target, formatter } = self else {
            return;
        };

        let target: &str = target;

        // Only pay for formatting when someone listens.
        if log::log_enabled!(target: target, level) {
            let line = formatter.format(category, address, details);
            log::log!(target: target, level, "{}", line);
        }
    }
}

impl Default for EventLogger {
    fn default() -> Self {
        EventLogger::Disabled
    }
}

impl fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLogger::Active { target, .. } => {
                f.debug_struct("Active").field("target", target).finish()
            }
            EventLogger::Disabled => f.write_str("Disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counting(AtomicUsize);

    impl EventFormatter for Counting {
        fn format(
            &self,
            category: &str,
            _address: Option<SocketAddr>,
            _details: &dyn fmt::Display,
        ) -> String {
            self.0.fetch_add(1, Ordering::SeqCst);
            category.to_string()
        }
    }

    #[test]
    fn plain_formatter_layout() {
        let addr: SocketAddr = "127.0.0.1:5683".parse().unwrap();
        let line = PlainFormatter.format(COAP_SENT, Some(addr), &"ACK 2.05 MID:5");
        assert_eq!(line, "CoAP sent [127.0.0.1:5683] ACK 2.05 MID:5");
        let line = PlainFormatter.format(COAP_RECEIVED, None, &"x");
        assert_eq!(line, "CoAP received [-] x");
    }

    #[test]
    fn disabled_is_inert() {
        let events = EventLogger::disabled();
        events.fatal("a", None, &"b");
        events.error("a", None, &"b");
        events.warn("a", None, &"b");
        events.info("a", None, &"b");
        assert!(!events.is_active());
    }

    #[test]
    fn no_listener_skips_formatting() {
        // No logger is installed in unit tests, so every level is off.
        static COUNTING: Counting = Counting(AtomicUsize::new(0));
        let events = EventLogger::with_formatter("quiet", &COUNTING);
        events.warn(COAP_SENT, None, &"x");
        events.info(COAP_RECEIVED, None, &"x");
        assert_eq!(COUNTING.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn channel_becomes_target() {
        static FORMATTER: PlainFormatter = PlainFormatter;
        let events = EventLogger::with_formatter("coap", &FORMATTER);
        match events {
            EventLogger::Active { target, .. } => assert_eq!(&*target, "eventlog.coap"),
            EventLogger::Disabled => panic!("expected active"),
        }
    }
}
