use thiserror::Error;

use crate::exchange::ExchangeState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Datagram ended before the message was complete")]
    ParseIncomplete,

    #[error("Malformed message: {0:?}")]
    ParseError(nom::error::ErrorKind),

    #[error("Token too long: {0} > 8")]
    InvalidToken(usize),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Empty message (code 0.00) must not carry token, options or payload")]
    InvalidEmptyMessage,

    #[error("Transmit queue full")]
    TransmitQueueFull,

    #[error("Exchange already finished in state {0:?}")]
    ExchangeClosed(ExchangeState),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::ParseIncomplete,
            nom::Err::Error(e) | nom::Err::Failure(e) => match e.code {
                nom::error::ErrorKind::Eof => Error::ParseIncomplete,
                code => Error::ParseError(code),
            },
        }
    }
}
