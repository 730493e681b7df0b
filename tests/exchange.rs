//! Exchange lifecycle against an in-memory dispatcher.

mod endpoint_common;

use coapex::eventlog::EventLogger;
use coapex::{
    Code, Error, Exchange, ExchangeState, Message, MessageType, Method, Token, TransportContext,
};
use endpoint_common::*;

fn exchange_for(request: Message) -> Exchange {
    Exchange::from_request(peer(), request, EventLogger::disabled())
}

#[test]
fn confirmable_get_gets_piggybacked_ack() {
    let _ = env_logger::try_init();

    let mut d = Recorder::default();
    let mut ex = exchange_for(Message::request(MessageType::Confirmable, Method::Get, 5));
    ex.set_response_code(Code::Content).unwrap();
    ex.send_response(&mut d).unwrap();

    assert_eq!(d.sent.len(), 1);
    let Sent::Response(to, m) = &d.sent[0] else {
        panic!("piggybacked response goes through send_response");
    };
    assert_eq!(*to, peer());
    assert_eq!(m.message_type(), MessageType::Acknowledgement);
    assert_eq!(m.message_id(), 5);
    assert_eq!(m.code(), Some(Code::Content));
}

#[test]
fn delayed_ack_then_separate_confirmable_response() {
    let _ = env_logger::try_init();

    let mut d = Recorder::default();
    let mut req = Message::request(MessageType::Confirmable, Method::Get, 7);
    req.set_token(Token::try_new(&[0xBE, 0xEF]).unwrap());
    let mut ex = exchange_for(req);

    ex.send_delayed_ack(&mut d).unwrap();
    assert_eq!(ex.state(), ExchangeState::DelayedAckSent);
    assert!(ex.is_delayed_response());

    ex.set_response_code(Code::Content).unwrap();
    ex.set_response_body_str("22.5 C").unwrap();
    ex.send_response(&mut d).unwrap();
    assert_eq!(ex.state(), ExchangeState::Responded);

    assert_eq!(d.sent.len(), 2);

    // Empty ACK strictly first.
    let Sent::Response(_, ack) = &d.sent[0] else {
        panic!("empty ACK goes through send_response");
    };
    assert_eq!(ack.message_type(), MessageType::Acknowledgement);
    assert_eq!(ack.message_id(), 7);
    assert_eq!(ack.code(), None);
    assert!(ack.is_empty());

    let Sent::Submit(_, resp) = &d.sent[1] else {
        panic!("separate response goes through submit");
    };
    assert_eq!(resp.message_type(), MessageType::Confirmable);
    assert_eq!(resp.code(), Some(Code::Content));
    assert_eq!(&resp.token()[..], &[0xBE, 0xEF]);
    assert_eq!(resp.payload(), b"22.5 C");
}

#[test]
fn non_message_without_method_is_not_answered() {
    let mut d = Recorder::default();
    let mut non = Message::new(MessageType::NonConfirmable, 3);
    non.set_code(Some(Code::Content));
    let mut ex = exchange_for(non);

    ex.send_response(&mut d).unwrap();
    assert!(d.sent.is_empty());
}

#[test]
fn confirmable_reset_echoes_message_id() {
    let mut d = Recorder::default();
    let mut ex = exchange_for(Message::request(MessageType::Confirmable, Method::Get, 31));
    ex.send_reset_response(&mut d).unwrap();

    assert_eq!(ex.state(), ExchangeState::Reset);
    assert_eq!(d.sent.len(), 1);
    let m = d.sent[0].message();
    assert_eq!(m.message_type(), MessageType::Reset);
    assert_eq!(m.code(), None);
    assert_eq!(m.message_id(), 31);
}

#[test]
fn non_request_delayed_ack_is_noop_and_response_stays_non() {
    let mut d = Recorder::default();
    let mut ex = exchange_for(Message::request(MessageType::NonConfirmable, Method::Get, 9));

    ex.send_delayed_ack(&mut d).unwrap();
    assert!(d.sent.is_empty());
    assert_eq!(ex.state(), ExchangeState::Open);

    ex.set_response_code(Code::Content).unwrap();
    ex.send_response(&mut d).unwrap();

    assert_eq!(d.sent.len(), 1);
    let Sent::Response(_, m) = &d.sent[0] else {
        panic!("NON response goes through send_response");
    };
    assert_eq!(m.message_type(), MessageType::NonConfirmable);
}

#[derive(Debug, Clone, Copy)]
enum Path {
    Piggybacked,
    Separate,
    Reset,
}

#[test]
fn each_confirmable_path_emits_once() {
    for (path, expected) in [(Path::Piggybacked, 1), (Path::Separate, 2), (Path::Reset, 1)] {
        let mut d = Recorder::default();
        let mut ex = exchange_for(Message::request(MessageType::Confirmable, Method::Post, 1));

        match path {
            Path::Piggybacked => ex.send_response(&mut d).unwrap(),
            Path::Separate => {
                ex.send_delayed_ack(&mut d).unwrap();
                ex.send_response(&mut d).unwrap();
            }
            Path::Reset => ex.send_reset_response(&mut d).unwrap(),
        }
        assert_eq!(d.sent.len(), expected, "{:?}", path);

        // Nothing more can leave this exchange.
        assert!(matches!(
            ex.send_response(&mut d),
            Err(Error::ExchangeClosed(_))
        ));
        assert!(matches!(
            ex.send_reset_response(&mut d),
            Err(Error::ExchangeClosed(_))
        ));
        assert_eq!(d.sent.len(), expected, "{:?}", path);
    }
}

#[test]
fn separate_response_survives_transport_failure() {
    let _ = env_logger::try_init();

    let mut d = Recorder {
        fail_submit: true,
        ..Default::default()
    };
    let mut ex = exchange_for(Message::request(MessageType::Confirmable, Method::Get, 4));
    ex.send_delayed_ack(&mut d).unwrap();
    ex.set_response_code(Code::Content).unwrap();

    assert!(ex.send_response(&mut d).is_ok());
    assert_eq!(ex.state(), ExchangeState::Responded);
    assert!(matches!(ex.response(), Err(Error::ExchangeClosed(_))));
}

#[test]
fn set_response_replaces_draft() {
    let mut d = Recorder::default();
    let req = Message::request(MessageType::Confirmable, Method::Get, 12);
    let mut ex = exchange_for(req.clone());

    let mut custom = req.create_response();
    custom.set_code(Some(Code::NotFound));
    custom.options_mut().set_max_age(0);
    ex.set_response(custom.clone()).unwrap();
    ex.send_response(&mut d).unwrap();

    assert_eq!(d.sent[0].message(), &custom);
}

#[test]
fn explicit_response_draft_is_used() {
    let mut d = Recorder::default();
    let req = Message::request(MessageType::Confirmable, Method::Delete, 40);
    let mut draft = req.create_response();
    draft.set_code(Some(Code::Deleted));

    let mut ex = Exchange::new(peer(), req, draft, EventLogger::disabled());
    ex.set_response_token(Token::try_new(&[9]).unwrap()).unwrap();
    assert_eq!(&ex.response_token().unwrap()[..], &[9]);
    ex.send_response(&mut d).unwrap();

    let m = d.sent[0].message();
    assert_eq!(m.code(), Some(Code::Deleted));
    assert_eq!(&m.token()[..], &[9]);
}

#[test]
fn transport_context_travels_both_ways() {
    let mut d = Recorder::default();
    let mut req = Message::request(MessageType::Confirmable, Method::Get, 21);
    req.set_transport_context(Some(TransportContext::new().with("iface", "eth0")));
    let mut ex = exchange_for(req);

    let inbound = ex.request_transport_context().expect("request context");
    assert_eq!(inbound.get("iface"), Some("eth0"));
    assert_eq!(ex.response_transport_context().unwrap(), None);

    let outbound = TransportContext::new().with("peer-identity", "sensor-17");
    ex.set_response_transport_context(Some(outbound.clone()))
        .unwrap();
    assert_eq!(ex.response_transport_context().unwrap(), Some(&outbound));

    ex.set_response_code(Code::Content).unwrap();
    ex.send_response(&mut d).unwrap();

    let sent = d.sent[0].message();
    assert_eq!(sent.transport_context(), Some(&outbound));

    // The request side stays readable, the response side is gone.
    assert_eq!(
        ex.request_transport_context().and_then(|c| c.get("iface")),
        Some("eth0")
    );
    assert!(matches!(
        ex.response_transport_context(),
        Err(Error::ExchangeClosed(ExchangeState::Responded))
    ));
}
