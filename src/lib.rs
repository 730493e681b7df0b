//! coapex is a Sans-IO implementation of the CoAP (RFC 7252) exchange layer.
//!
//! The crate pairs each inbound request with the response the application
//! builds for it, and enforces the legal ways of sending that response:
//!
//! * **Piggybacked**: the response rides in the ACK of a confirmable request
//!   (or as a NON answer to a non-confirmable one).
//! * **Separate**: an empty ACK goes out immediately, the response follows
//!   later as its own confirmable message.
//! * **Reset**: the request is rejected.
//!
//! An [`Exchange`] goes out exactly once. A second terminal action fails
//! with [`Error::ExchangeClosed`] instead of sending again.
//!
//! The network side is the [`Dispatcher`] trait. [`Endpoint`] is a complete
//! dispatcher without I/O: it decodes datagrams, detects duplicates,
//! retransmits confirmable messages and hands requests to the application
//! through [`Endpoint::poll_output`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use coapex::{Code, Config, Endpoint, Message, MessageType, Method, Output};
//!
//! let now = Instant::now();
//! let config = Arc::new(Config::default());
//! let mut endpoint = Endpoint::new(config, now);
//!
//! let peer = "127.0.0.1:40000".parse().unwrap();
//! let mut req = Message::request(MessageType::Confirmable, Method::Get, 5);
//! req.options_mut().set_uri_path("/hello");
//! let mut datagram = Vec::new();
//! req.serialize(&mut datagram);
//!
//! endpoint.handle_packet(now, peer, &datagram).unwrap();
//!
//! let mut buf = vec![0; 1152];
//! let Output::Request(mut exchange) = endpoint.poll_output(&mut buf) else {
//!     panic!("expected a request");
//! };
//! assert_eq!(exchange.request_uri(), "/hello");
//!
//! exchange.set_response_code(Code::Content).unwrap();
//! exchange.set_response_body_str("world").unwrap();
//! exchange.send_response(&mut endpoint).unwrap();
//!
//! let Output::Packet(to, bytes) = endpoint.poll_output(&mut buf) else {
//!     panic!("expected a packet");
//! };
//! assert_eq!(to, peer);
//! let ack = Message::parse(bytes).unwrap();
//! assert_eq!(ack.message_type(), MessageType::Acknowledgement);
//! assert_eq!(ack.message_id(), 5);
//! assert_eq!(ack.payload(), b"world");
//! ```
//!
//! # Logging
//!
//! Diagnostics go through the `log` facade. Protocol events (sent, received,
//! reset, timeout) go through an [`EventLogger`](eventlog::EventLogger),
//! disabled unless a formatter is installed with
//! [`eventlog::install_default_formatter`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

mod config;
pub use config::{Config, ConfigBuilder};

mod error;
pub use error::Error;

pub mod eventlog;

mod message;
pub use message::{
    option, Code, Message, MessageType, Method, Options, RawOption, Token, TransportContext,
    MAX_TOKEN_LEN,
};

mod exchange;
pub use exchange::{Dispatcher, Exchange, ExchangeState};

mod endpoint;
pub use endpoint::{Endpoint, Output};

mod dedup;
mod rng;
mod transaction;
