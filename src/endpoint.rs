// Endpoint datagram handling:
//
// Inbound
//   malformed          -> Reset if the header says CON, error returned
//   ACK / RST          -> completes our outstanding CON with that message id
//   empty CON (ping)   -> Reset through an exchange
//   empty NON          -> dropped
//   request            -> duplicate check, then Output::Request(Exchange)
//                         (4.02 Bad Option on unknown critical options)
//   response CON / NON -> empty ACK / dropped
//
// Outbound
//   Dispatcher::send_response -> queued once, cached for duplicate replay
//   Dispatcher::submit        -> fresh message id, CON retransmitted until
//                                ACK/RST or max_retransmit exhausted

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::dedup::{DuplicateCache, Seen};
use crate::eventlog::{EventLogger, COAP_RECEIVED, COAP_SENT};
use crate::exchange::{Dispatcher, Exchange};
use crate::message::{Code, Message, MessageType};
use crate::rng::SeededRng;
use crate::transaction::{RetransmitBackoff, Transaction};
use crate::{Config, Error};

const COAP_RESET: &str = "CoAP reset";
const COAP_TIMEOUT: &str = "CoAP timeout";

/// Output from [`Endpoint::poll_output`].
#[derive(Debug)]
pub enum Output<'a> {
    /// A datagram to send to the peer.
    Packet(SocketAddr, &'a [u8]),
    /// A request for the application. Answer it through the exchange,
    /// passing the endpoint as dispatcher.
    Request(Exchange),
    /// Call [`Endpoint::handle_timeout`] at this instant.
    Timeout(Instant),
}

struct Outgoing {
    remote: SocketAddr,
    datagram: Vec<u8>,
}

/// Sans-IO CoAP endpoint.
///
/// Feed it datagrams with [`handle_packet`](Self::handle_packet), drive its
/// timers with [`handle_timeout`](Self::handle_timeout) and drain
/// [`poll_output`](Self::poll_output) until it returns a timeout.
pub struct Endpoint {
    config: Arc<Config>,
    rng: SeededRng,
    next_message_id: u16,
    now: Instant,
    queue_tx: VecDeque<Outgoing>,
    queue_requests: VecDeque<Exchange>,
    transactions: Vec<Transaction>,
    dedup: DuplicateCache,
    events: EventLogger,
}

impl Endpoint {
    pub fn new(config: Arc<Config>, now: Instant) -> Self {
        let mut rng = SeededRng::new(config.rng_seed());
        let next_message_id = rng.message_id();
        let events = EventLogger::new(config.event_channel());
        let dedup = DuplicateCache::new(config.exchange_lifetime());

        Endpoint {
            config,
            rng,
            next_message_id,
            now,
            queue_tx: VecDeque::new(),
            queue_requests: VecDeque::new(),
            transactions: Vec::new(),
            dedup,
            events,
        }
    }

    /// Replace the event sink picked at construction.
    pub fn set_event_logger(&mut self, events: EventLogger) {
        self.events = events;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Confirmable messages still waiting for an ACK.
    pub fn outstanding(&self) -> usize {
        self.transactions.len()
    }

    pub fn handle_packet(
        &mut self,
        now: Instant,
        remote: SocketAddr,
        packet: &[u8],
    ) -> Result<(), Error> {
        self.now = now;

        let message = match Message::parse(packet) {
            Ok(m) => m,
            Err(e) => {
                debug!("Malformed datagram from {}: {}", remote, e);
                if let Some((MessageType::Confirmable, message_id)) = Message::peek_header(packet) {
                    let reset = Message::new(MessageType::Reset, message_id);
                    if let Err(e) = self.send_response(remote, reset) {
                        debug!("Failed to reject malformed message: {}", e);
                    }
                }
                return Err(e);
            }
        };

        self.events.info(COAP_RECEIVED, Some(remote), &message);

        match message.message_type() {
            MessageType::Acknowledgement | MessageType::Reset => {
                self.complete_transaction(remote, &message);
                Ok(())
            }
            MessageType::Confirmable | MessageType::NonConfirmable => {
                if message.is_request() {
                    self.handle_request(remote, message)
                } else if message.is_response() {
                    self.handle_separate_response(remote, &message)
                } else {
                    self.handle_empty(remote, message)
                }
            }
        }
    }

    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), Error> {
        self.now = now;
        self.dedup.purge(now);

        let mut i = 0;
        while i < self.transactions.len() {
            if self.transactions[i].deadline > now {
                i += 1;
                continue;
            }

            if !self.transactions[i].backoff.can_retry() {
                let t = self.transactions.swap_remove(i);
                warn!("Giving up on MID:{} to {}", t.message_id, t.remote);
                self.events.warn(
                    COAP_TIMEOUT,
                    Some(t.remote),
                    &format_args!("MID:{}", t.message_id),
                );
                continue;
            }

            if self.queue_tx.len() >= self.config.max_queue_tx() {
                // Try again on the next timeout.
                break;
            }

            let t = &mut self.transactions[i];
            t.backoff.attempt();
            t.deadline = now + t.backoff.rto();
            debug!("Retransmit MID:{} to {}", t.message_id, t.remote);
            self.queue_tx.push_back(Outgoing {
                remote: t.remote,
                datagram: t.datagram.clone(),
            });
            i += 1;
        }

        Ok(())
    }

    /// Next output.
    ///
    /// # Panics
    ///
    /// If `buf` is smaller than the datagram to send. A buffer of
    /// `max_message_size` bytes always fits.
    pub fn poll_output<'a>(&mut self, buf: &'a mut [u8]) -> Output<'a> {
        if let Some(out) = self.queue_tx.pop_front() {
            let len = out.datagram.len();
            assert!(len <= buf.len(), "Buffer too small for datagram");
            buf[..len].copy_from_slice(&out.datagram);
            return Output::Packet(out.remote, &buf[..len]);
        }

        if let Some(exchange) = self.queue_requests.pop_front() {
            return Output::Request(exchange);
        }

        Output::Timeout(self.next_timeout())
    }

    fn next_timeout(&self) -> Instant {
        let retransmit = self.transactions.iter().map(|t| t.deadline).min();
        let expiry = self.dedup.next_expiry();

        match (retransmit, expiry) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => self.now + self.config.exchange_lifetime(),
        }
    }

    fn handle_request(&mut self, remote: SocketAddr, message: Message) -> Result<(), Error> {
        let message_id = message.message_id();

        match self.dedup.check_and_insert(remote, message_id, self.now) {
            Seen::New => {}
            Seen::InProgress => {
                debug!("Duplicate MID:{} from {}, still in progress", message_id, remote);
                return Ok(());
            }
            Seen::Replay(datagram) => {
                debug!("Duplicate MID:{} from {}, replaying response", message_id, remote);
                return self.enqueue(remote, datagram);
            }
        }

        let mut exchange = Exchange::from_request(remote, message, self.events.clone());

        if let Some(number) = exchange.request_headers().first_unrecognized_critical() {
            debug!("Unrecognized critical option {} from {}", number, remote);
            exchange.set_response_code(Code::BadOption)?;
            return exchange.send_response(self);
        }

        self.queue_requests.push_back(exchange);
        Ok(())
    }

    fn handle_empty(&mut self, remote: SocketAddr, message: Message) -> Result<(), Error> {
        if message.message_type() != MessageType::Confirmable {
            trace!("Dropping empty NON from {}", remote);
            return Ok(());
        }

        // CoAP ping
        let mut exchange = Exchange::from_request(remote, message, self.events.clone());
        exchange.send_reset_response(self)
    }

    fn handle_separate_response(
        &mut self,
        remote: SocketAddr,
        message: &Message,
    ) -> Result<(), Error> {
        debug!("Unsolicited response from {}: {}", remote, message);
        if message.message_type() == MessageType::Confirmable {
            self.send_response(remote, Message::empty_ack(message.message_id()))?;
        }
        Ok(())
    }

    fn complete_transaction(&mut self, remote: SocketAddr, message: &Message) {
        let message_id = message.message_id();
        let Some(idx) = self
            .transactions
            .iter()
            .position(|t| t.matches(remote, message_id))
        else {
            trace!("No transaction for {} from {}", message, remote);
            return;
        };

        self.transactions.swap_remove(idx);

        if message.message_type() == MessageType::Reset {
            debug!("Peer {} reset MID:{}", remote, message_id);
            self.events.warn(COAP_RESET, Some(remote), message);
        }
    }

    fn encode(&self, message: &Message) -> Result<Vec<u8>, Error> {
        // Code 0.00 is exactly the 4 byte header on the wire.
        if message.is_empty()
            && (!message.token().is_empty()
                || !message.options().is_empty()
                || !message.payload().is_empty())
        {
            return Err(Error::InvalidEmptyMessage);
        }

        let len = message.serialized_len();
        if len > self.config.max_message_size() {
            return Err(Error::MessageTooLarge(len));
        }
        let mut datagram = Vec::with_capacity(len);
        message.serialize(&mut datagram);
        Ok(datagram)
    }

    fn enqueue(&mut self, remote: SocketAddr, datagram: Vec<u8>) -> Result<(), Error> {
        if self.queue_tx.len() >= self.config.max_queue_tx() {
            return Err(Error::TransmitQueueFull);
        }
        self.queue_tx.push_back(Outgoing { remote, datagram });
        Ok(())
    }

    fn next_message_id(&mut self) -> u16 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }
}

impl Dispatcher for Endpoint {
    fn send_response(&mut self, remote: SocketAddr, message: Message) -> Result<(), Error> {
        let datagram = self.encode(&message)?;
        self.enqueue(remote, datagram.clone())?;
        self.dedup
            .record_response(remote, message.message_id(), &datagram);
        self.events.info(COAP_SENT, Some(remote), &message);
        Ok(())
    }

    fn submit(&mut self, remote: SocketAddr, mut message: Message) -> Result<(), Error> {
        if self.queue_tx.len() >= self.config.max_queue_tx() {
            return Err(Error::TransmitQueueFull);
        }

        message.set_message_id(self.next_message_id());
        let datagram = self.encode(&message)?;

        if message.message_type() == MessageType::Confirmable {
            let backoff = RetransmitBackoff::new(
                self.config.ack_timeout(),
                self.config.ack_random_factor(),
                self.config.max_retransmit(),
                &mut self.rng,
            );
            self.transactions.push(Transaction::new(
                remote,
                message.message_id(),
                datagram.clone(),
                backoff,
                self.now,
            ));
        }

        self.enqueue(remote, datagram)?;
        self.events.info(COAP_SENT, Some(remote), &message);
        Ok(())
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("queue_tx", &self.queue_tx.len())
            .field("queue_requests", &self.queue_requests.len())
            .field("transactions", &self.transactions.len())
            .finish()
    }
}
