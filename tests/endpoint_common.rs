//! Shared helpers for endpoint integration tests.

#![allow(unused)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use coapex::{Config, Dispatcher, Endpoint, Error, Exchange, Message, MessageType, Method, Token};

pub const MTU: usize = 1152;

pub fn peer() -> SocketAddr {
    "198.51.100.7:5683".parse().unwrap()
}

pub fn config() -> Arc<Config> {
    Arc::new(
        Config::builder()
            .rng_seed(42)
            .build()
            .expect("Failed to build config"),
    )
}

/// Everything one round of `poll_output` produced.
#[derive(Default)]
pub struct Drained {
    pub packets: Vec<(SocketAddr, Vec<u8>)>,
    pub requests: Vec<Exchange>,
    pub timeout: Option<Instant>,
}

impl Drained {
    pub fn messages(&self) -> Vec<Message> {
        self.packets
            .iter()
            .map(|(_, p)| Message::parse(p).expect("endpoint emits valid messages"))
            .collect()
    }
}

pub fn drain(endpoint: &mut Endpoint) -> Drained {
    let mut out = Drained::default();
    let mut buf = vec![0u8; MTU];
    loop {
        match endpoint.poll_output(&mut buf) {
            coapex::Output::Packet(to, p) => out.packets.push((to, p.to_vec())),
            coapex::Output::Request(ex) => out.requests.push(ex),
            coapex::Output::Timeout(t) => {
                out.timeout = Some(t);
                break;
            }
        }
    }
    out
}

pub fn encode(message: &Message) -> Vec<u8> {
    let mut out = Vec::new();
    message.serialize(&mut out);
    out
}

pub fn get(message_type: MessageType, mid: u16, path: &str) -> Message {
    let mut m = Message::request(message_type, Method::Get, mid);
    m.set_token(Token::try_new(&[0x11, 0x22, 0x33]).unwrap());
    m.options_mut().set_uri_path(path);
    m
}

/// In-memory dispatcher recording everything handed to it.
#[derive(Default)]
pub struct Recorder {
    pub sent: Vec<Sent>,
    pub fail_submit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Response(SocketAddr, Message),
    Submit(SocketAddr, Message),
}

impl Sent {
    pub fn message(&self) -> &Message {
        match self {
            Sent::Response(_, m) | Sent::Submit(_, m) => m,
        }
    }
}

impl Dispatcher for Recorder {
    fn send_response(&mut self, remote: SocketAddr, message: Message) -> Result<(), Error> {
        self.sent.push(Sent::Response(remote, message));
        Ok(())
    }

    fn submit(&mut self, remote: SocketAddr, message: Message) -> Result<(), Error> {
        if self.fail_submit {
            return Err(Error::TransmitQueueFull);
        }
        self.sent.push(Sent::Submit(remote, message));
        Ok(())
    }
}
