//! CoAP message model.
//!
//! A [`Message`] is the decoded form of one datagram. The exchange layer only
//! ever reads and rewrites these values; the byte level codec lives in
//! [`wire`](self::wire).

mod context;
mod options;
mod token;
mod wire;

use std::fmt;

pub use context::TransportContext;
pub use options::{Options, RawOption};
pub use token::{Token, MAX_TOKEN_LEN};

/// Option numbers (RFC 7252 §12.2).
pub mod option {
    pub use super::options::{
        ACCEPT, CONTENT_FORMAT, ETAG, IF_MATCH, IF_NONE_MATCH, LOCATION_PATH, LOCATION_QUERY,
        MAX_AGE, PROXY_SCHEME, PROXY_URI, SIZE1, SIZE2, URI_HOST, URI_PATH, URI_PORT, URI_QUERY,
    };
}

/// Message type, the `T` field of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Confirmable,
    NonConfirmable,
    Acknowledgement,
    Reset,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value & 0b11 {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgement,
            _ => MessageType::Reset,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::Confirmable => 0,
            MessageType::NonConfirmable => 1,
            MessageType::Acknowledgement => 2,
            MessageType::Reset => 3,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Confirmable => "CON",
            MessageType::NonConfirmable => "NON",
            MessageType::Acknowledgement => "ACK",
            MessageType::Reset => "RST",
        };
        f.write_str(s)
    }
}

/// Request method, code class 0 (RFC 7252 §12.1.1, RFC 8132).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Fetch,
    Patch,
    IPatch,
    Unknown(u8),
}

impl Method {
    /// From the code detail (the low 5 bits of a class 0 code).
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Method::Get,
            2 => Method::Post,
            3 => Method::Put,
            4 => Method::Delete,
            5 => Method::Fetch,
            6 => Method::Patch,
            7 => Method::IPatch,
            _ => Method::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Method::Get => 1,
            Method::Post => 2,
            Method::Put => 3,
            Method::Delete => 4,
            Method::Fetch => 5,
            Method::Patch => 6,
            Method::IPatch => 7,
            Method::Unknown(value) => *value,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
            Method::Put => f.write_str("PUT"),
            Method::Delete => f.write_str("DELETE"),
            Method::Fetch => f.write_str("FETCH"),
            Method::Patch => f.write_str("PATCH"),
            Method::IPatch => f.write_str("iPATCH"),
            Method::Unknown(v) => write!(f, "0.{:02}", v),
        }
    }
}

/// Response code, code classes 2 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Created,
    Deleted,
    Valid,
    Changed,
    Content,
    BadRequest,
    Unauthorized,
    BadOption,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    PreconditionFailed,
    RequestEntityTooLarge,
    UnsupportedContentFormat,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    ProxyingNotSupported,
    Unknown(u8),
}

impl Code {
    /// From the raw code byte (`class << 5 | detail`).
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x41 => Code::Created,
            0x42 => Code::Deleted,
            0x43 => Code::Valid,
            0x44 => Code::Changed,
            0x45 => Code::Content,
            0x80 => Code::BadRequest,
            0x81 => Code::Unauthorized,
            0x82 => Code::BadOption,
            0x83 => Code::Forbidden,
            0x84 => Code::NotFound,
            0x85 => Code::MethodNotAllowed,
            0x86 => Code::NotAcceptable,
            0x8C => Code::PreconditionFailed,
            0x8D => Code::RequestEntityTooLarge,
            0x8F => Code::UnsupportedContentFormat,
            0xA0 => Code::InternalServerError,
            0xA1 => Code::NotImplemented,
            0xA2 => Code::BadGateway,
            0xA3 => Code::ServiceUnavailable,
            0xA4 => Code::GatewayTimeout,
            0xA5 => Code::ProxyingNotSupported,
            _ => Code::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Code::Created => 0x41,
            Code::Deleted => 0x42,
            Code::Valid => 0x43,
            Code::Changed => 0x44,
            Code::Content => 0x45,
            Code::BadRequest => 0x80,
            Code::Unauthorized => 0x81,
            Code::BadOption => 0x82,
            Code::Forbidden => 0x83,
            Code::NotFound => 0x84,
            Code::MethodNotAllowed => 0x85,
            Code::NotAcceptable => 0x86,
            Code::PreconditionFailed => 0x8C,
            Code::RequestEntityTooLarge => 0x8D,
            Code::UnsupportedContentFormat => 0x8F,
            Code::InternalServerError => 0xA0,
            Code::NotImplemented => 0xA1,
            Code::BadGateway => 0xA2,
            Code::ServiceUnavailable => 0xA3,
            Code::GatewayTimeout => 0xA4,
            Code::ProxyingNotSupported => 0xA5,
            Code::Unknown(value) => *value,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.as_u8();
        write!(f, "{}.{:02}", v >> 5, v & 0x1F)
    }
}

/// One CoAP message.
///
/// `code` and `method` share the single code byte of the header, so setting
/// one clears the other. A message with neither is an empty message (empty
/// ACK, Reset or ping).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    message_type: MessageType,
    code: Option<Code>,
    method: Option<Method>,
    message_id: u16,
    token: Token,
    options: Options,
    payload: Vec<u8>,
    transport_context: Option<TransportContext>,
}

impl Message {
    /// A new empty message of the given type.
    pub fn new(message_type: MessageType, message_id: u16) -> Self {
        Message {
            message_type,
            code: None,
            method: None,
            message_id,
            token: Token::empty(),
            options: Options::new(),
            payload: Vec::new(),
            transport_context: None,
        }
    }

    /// A request with the given method.
    pub fn request(message_type: MessageType, method: Method, message_id: u16) -> Self {
        let mut m = Message::new(message_type, message_id);
        m.method = Some(method);
        m
    }

    /// The empty acknowledgement of `message_id`.
    pub fn empty_ack(message_id: u16) -> Self {
        Message::new(MessageType::Acknowledgement, message_id)
    }

    /// Default response skeleton for this request.
    ///
    /// Same message id and token. The type is Acknowledgement for a
    /// Confirmable request and NonConfirmable otherwise. Code is unset.
    pub fn create_response(&self) -> Message {
        let message_type = if self.message_type == MessageType::Confirmable {
            MessageType::Acknowledgement
        } else {
            MessageType::NonConfirmable
        };
        let mut m = Message::new(message_type, self.message_id);
        m.token = self.token.clone();
        m
    }

    /// Reset skeleton for this message.
    ///
    /// Echoes the message id. Resets are empty messages, so no token.
    pub fn create_reset(&self) -> Message {
        Message::new(MessageType::Reset, self.message_id)
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn set_message_type(&mut self, message_type: MessageType) {
        self.message_type = message_type;
    }

    pub fn code(&self) -> Option<Code> {
        self.code
    }

    /// Set the response code. Clears any method.
    pub fn set_code(&mut self, code: Option<Code>) {
        self.code = code;
        if code.is_some() {
            self.method = None;
        }
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    /// Set the request method. Clears any code.
    pub fn set_method(&mut self, method: Option<Method>) {
        self.method = method;
        if method.is_some() {
            self.code = None;
        }
    }

    pub fn message_id(&self) -> u16 {
        self.message_id
    }

    pub fn set_message_id(&mut self, message_id: u16) {
        self.message_id = message_id;
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn set_token(&mut self, token: Token) {
        self.token = token;
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload decoded as UTF-8, invalid sequences replaced.
    pub fn payload_string(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.payload = payload.into();
    }

    pub fn transport_context(&self) -> Option<&TransportContext> {
        self.transport_context.as_ref()
    }

    pub fn set_transport_context(&mut self, ctx: Option<TransportContext>) {
        self.transport_context = ctx;
    }

    /// No code and no method.
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.method.is_none()
    }

    pub fn is_request(&self) -> bool {
        self.method.is_some()
    }

    pub fn is_response(&self) -> bool {
        self.code.is_some()
    }

    /// The raw code byte as written to the wire.
    pub(crate) fn code_byte(&self) -> u8 {
        match (self.method, self.code) {
            (Some(m), _) => m.as_u8() & 0x1F,
            (None, Some(c)) => c.as_u8(),
            (None, None) => 0,
        }
    }

    /// Assign code or method from a raw code byte.
    pub(crate) fn set_code_byte(&mut self, byte: u8) {
        match byte {
            0 => {
                self.code = None;
                self.method = None;
            }
            b if b >> 5 == 0 => self.set_method(Some(Method::from_u8(b))),
            b => self.set_code(Some(Code::from_u8(b))),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message_type)?;
        match (self.method, self.code) {
            (Some(m), _) => write!(f, " {}", m)?,
            (None, Some(c)) => write!(f, " {}", c)?,
            (None, None) => f.write_str(" empty")?,
        }
        write!(f, " MID:{}", self.message_id)?;
        if !self.token.is_empty() {
            write!(f, " Token:{}", self.token)?;
        }
        if !self.options.is_empty() {
            write!(f, " {}", self.options)?;
        }
        if !self.payload.is_empty() {
            write!(f, " pl:{}", self.payload.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_to_confirmable_is_ack() {
        let mut req = Message::request(MessageType::Confirmable, Method::Get, 5);
        req.set_token(Token::try_new(&[0xAB]).unwrap());

        let resp = req.create_response();
        assert_eq!(resp.message_type(), MessageType::Acknowledgement);
        assert_eq!(resp.message_id(), 5);
        assert_eq!(resp.token(), req.token());
        assert!(resp.is_empty());
    }

    #[test]
    fn response_to_non_confirmable_is_non() {
        let req = Message::request(MessageType::NonConfirmable, Method::Post, 9);
        let resp = req.create_response();
        assert_eq!(resp.message_type(), MessageType::NonConfirmable);
        assert_eq!(resp.message_id(), 9);
    }

    #[test]
    fn reset_is_empty_and_echoes_id() {
        let mut req = Message::request(MessageType::Confirmable, Method::Get, 77);
        req.set_token(Token::try_new(&[1, 2]).unwrap());
        let rst = req.create_reset();
        assert_eq!(rst.message_type(), MessageType::Reset);
        assert_eq!(rst.message_id(), 77);
        assert!(rst.is_empty());
        assert!(rst.token().is_empty());
    }

    #[test]
    fn code_and_method_are_exclusive() {
        let mut m = Message::request(MessageType::Confirmable, Method::Get, 1);
        m.set_code(Some(Code::Content));
        assert_eq!(m.method(), None);
        m.set_method(Some(Method::Put));
        assert_eq!(m.code(), None);
    }

    #[test]
    fn code_display_uses_dotted_form() {
        assert_eq!(Code::Content.to_string(), "2.05");
        assert_eq!(Code::BadOption.to_string(), "4.02");
        assert_eq!(Code::ProxyingNotSupported.to_string(), "5.05");
    }

    #[test]
    fn code_byte_roundtrip() {
        let mut m = Message::new(MessageType::Confirmable, 1);
        m.set_code_byte(0x01);
        assert_eq!(m.method(), Some(Method::Get));
        m.set_code_byte(0x45);
        assert_eq!(m.code(), Some(Code::Content));
        assert_eq!(m.code_byte(), 0x45);
        m.set_code_byte(0);
        assert!(m.is_empty());
    }
}
