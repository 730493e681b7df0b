use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use tinyvec::ArrayVec;

use crate::Error;

/// Longest token allowed on the wire (RFC 7252 §3).
pub const MAX_TOKEN_LEN: usize = 8;

/// Opaque correlator between a request and its (possibly separate) response.
///
/// Holds 0 to 8 bytes inline.
#[derive(Clone, Default)]
pub struct Token(ArrayVec<[u8; MAX_TOKEN_LEN]>);

impl Token {
    /// The zero length token.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a token from a slice.
    ///
    /// Returns [`Error::InvalidToken`] if the slice is longer than 8 bytes.
    pub fn try_new(data: &[u8]) -> Result<Self, Error> {
        if data.len() > MAX_TOKEN_LEN {
            return Err(Error::InvalidToken(data.len()));
        }
        let mut inner = ArrayVec::new();
        inner.extend_from_slice(data);
        Ok(Token(inner))
    }
}

impl Deref for Token {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.deref() == other.deref()
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.deref().hash(state)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl<'a> TryFrom<&'a [u8]> for Token {
    type Error = Error;

    fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl<const N: usize> TryFrom<[u8; N]> for Token {
    type Error = Error;

    fn try_from(value: [u8; N]) -> Result<Self, Self::Error> {
        Self::try_new(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_up_to_eight_bytes() {
        let t = Token::try_new(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(t.len(), 8);
        assert_eq!(t.to_string(), "0102030405060708");
    }

    #[test]
    fn rejects_nine_bytes() {
        let err = Token::try_new(&[0; 9]).unwrap_err();
        assert!(matches!(err, Error::InvalidToken(9)));
    }

    #[test]
    fn empty_equals_default() {
        assert_eq!(Token::empty(), Token::try_new(&[]).unwrap());
        assert!(Token::empty().is_empty());
    }
}
