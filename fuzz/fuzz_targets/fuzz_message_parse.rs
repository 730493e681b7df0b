#![no_main]

//! Fuzz target for CoAP message decoding and endpoint datagram handling.
//!
//! CoAP header (RFC 7252 §3):
//! - Ver(2) T(2) TKL(4): 1 byte
//! - Code: 1 byte
//! - Message ID: 2 bytes
//! - Token: 0-8 bytes
//! - Options: delta/length nibbles with 13/14 extensions
//! - 0xFF payload marker, then payload

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::time::Instant;

use coapex::{Config, Endpoint, Message, Output};

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must encode to something that decodes the same.
    if let Ok(message) = Message::parse(data) {
        let mut out = Vec::new();
        message.serialize(&mut out);
        let again = Message::parse(&out).expect("re-encoded message parses");
        assert_eq!(message, again);
    }

    let config = Arc::new(Config::default());
    let now = Instant::now();
    let mut endpoint = Endpoint::new(config, now);
    let peer = "192.0.2.1:5683".parse().unwrap();

    let _ = endpoint.handle_packet(now, peer, data);

    // Force a version 1 CON header so the request paths get exercised too.
    if data.len() >= 4 {
        let mut con = data.to_vec();
        con[0] = 0x40 | (con[0] & 0x0F);
        let _ = endpoint.handle_packet(now, peer, &con);
    }

    let mut buf = vec![0u8; 1152];
    loop {
        match endpoint.poll_output(&mut buf) {
            Output::Packet(_, p) => {
                Message::parse(p).expect("endpoint emits valid messages");
            }
            Output::Request(mut exchange) => {
                let _ = exchange.send_response(&mut endpoint);
            }
            Output::Timeout(_) => break,
        }
    }
});
