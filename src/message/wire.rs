// CoAP message format (RFC 7252 §3):
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Ver| T |  TKL  |      Code     |          Message ID           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Token (if any, TKL bytes) ...
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Options (if any) ...
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |1 1 1 1 1 1 1 1|    Payload (if any) ...
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::{Message, MessageType, Options, Token, MAX_TOKEN_LEN};
use crate::Error;

const VERSION: u8 = 1;
const PAYLOAD_MARKER: u8 = 0xFF;
pub(crate) const HEADER_LEN: usize = 4;

impl Message {
    /// Decode one datagram.
    ///
    /// The whole input is consumed. Format errors (bad version, token longer
    /// than 8, reserved option nibbles, payload marker without payload, data
    /// after an empty message header) yield [`Error::ParseError`]; truncated
    /// input yields [`Error::ParseIncomplete`].
    pub fn parse(input: &[u8]) -> Result<Message, Error> {
        let (_, message) = parse_message(input)?;
        Ok(message)
    }

    /// Type and message id of a datagram, if at least the fixed header is
    /// readable.
    ///
    /// Used to reject a confirmable message that otherwise fails to parse.
    pub fn peek_header(input: &[u8]) -> Option<(MessageType, u16)> {
        if input.len() < HEADER_LEN || input[0] >> 6 != VERSION {
            return None;
        }
        let message_type = MessageType::from_u8(input[0] >> 4);
        let message_id = u16::from_be_bytes([input[2], input[3]]);
        Some((message_type, message_id))
    }

    /// Encode this message onto `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(VERSION << 6 | self.message_type.as_u8() << 4 | self.token.len() as u8);
        out.push(self.code_byte());
        out.extend_from_slice(&self.message_id.to_be_bytes());
        out.extend_from_slice(&self.token);

        let mut prev = 0;
        for opt in self.options.iter() {
            write_option_header(out, opt.number - prev, opt.value.len());
            out.extend_from_slice(&opt.value);
            prev = opt.number;
        }

        if !self.payload.is_empty() {
            out.push(PAYLOAD_MARKER);
            out.extend_from_slice(&self.payload);
        }
    }

    /// Encoded length of this message.
    pub fn serialized_len(&self) -> usize {
        let mut len = HEADER_LEN + self.token.len();
        let mut prev = 0;
        for opt in self.options.iter() {
            len += 1 + ext_len(opt.number - prev) + ext_len_usize(opt.value.len());
            len += opt.value.len();
            prev = opt.number;
        }
        if !self.payload.is_empty() {
            len += 1 + self.payload.len();
        }
        len
    }
}

fn failure(input: &[u8], kind: ErrorKind) -> Err<NomError<&[u8]>> {
    Err::Failure(NomError::new(input, kind))
}

fn parse_message(input: &[u8]) -> IResult<&[u8], Message> {
    let (input, first) = be_u8(input)?;
    if first >> 6 != VERSION {
        return Err(failure(input, ErrorKind::Tag));
    }
    let message_type = MessageType::from_u8(first >> 4);
    let token_len = (first & 0x0F) as usize;
    if token_len > MAX_TOKEN_LEN {
        return Err(failure(input, ErrorKind::LengthValue));
    }

    let (input, code) = be_u8(input)?;
    let (input, message_id) = be_u16(input)?;

    let mut message = Message::new(message_type, message_id);
    message.set_code_byte(code);

    if code == 0 {
        // An empty message is exactly the 4 byte header.
        if token_len != 0 || !input.is_empty() {
            return Err(failure(input, ErrorKind::Verify));
        }
        return Ok((input, message));
    }

    let (input, token) = take(token_len)(input)?;
    // Length checked above.
    message.token = Token::try_new(token).map_err(|_| failure(input, ErrorKind::LengthValue))?;

    let (input, options) = parse_options(input)?;
    message.options = options;

    if let Some((&marker, payload)) = input.split_first() {
        debug_assert_eq!(marker, PAYLOAD_MARKER);
        if payload.is_empty() {
            return Err(failure(input, ErrorKind::Verify));
        }
        message.payload = payload.to_vec();
    }

    Ok((&input[input.len()..], message))
}

/// Options run until the payload marker or the end of the datagram.
fn parse_options(mut input: &[u8]) -> IResult<&[u8], Options> {
    let mut options = Options::new();
    let mut number: u32 = 0;

    loop {
        match input.first() {
            None | Some(&PAYLOAD_MARKER) => return Ok((input, options)),
            _ => {}
        }

        let (rest, byte) = be_u8(input)?;
        let (rest, delta) = parse_extended(rest, byte >> 4)?;
        let (rest, length) = parse_extended(rest, byte & 0x0F)?;
        let (rest, value) = take(length as usize)(rest)?;

        number += delta;
        if number > u16::MAX as u32 {
            return Err(failure(input, ErrorKind::TooLarge));
        }
        options.add(number as u16, value);

        input = rest;
    }
}

fn parse_extended(input: &[u8], nibble: u8) -> IResult<&[u8], u32> {
    match nibble {
        0..=12 => Ok((input, nibble as u32)),
        13 => {
            let (input, v) = be_u8(input)?;
            Ok((input, v as u32 + 13))
        }
        14 => {
            let (input, v) = be_u16(input)?;
            Ok((input, v as u32 + 269))
        }
        // 15 is reserved for the payload marker.
        _ => Err(failure(input, ErrorKind::Verify)),
    }
}

fn nibble(value: u32) -> u8 {
    match value {
        0..=12 => value as u8,
        13..=268 => 13,
        _ => 14,
    }
}

fn ext_len(value: u16) -> usize {
    ext_len_usize(value as usize)
}

fn ext_len_usize(value: usize) -> usize {
    match value {
        0..=12 => 0,
        13..=268 => 1,
        _ => 2,
    }
}

fn write_extended(out: &mut Vec<u8>, value: u32) {
    match value {
        0..=12 => {}
        13..=268 => out.push((value - 13) as u8),
        _ => out.extend_from_slice(&((value - 269) as u16).to_be_bytes()),
    }
}

fn write_option_header(out: &mut Vec<u8>, delta: u16, len: usize) {
    let delta = delta as u32;
    let len = len as u32;
    out.push(nibble(delta) << 4 | nibble(len));
    write_extended(out, delta);
    write_extended(out, len);
}
