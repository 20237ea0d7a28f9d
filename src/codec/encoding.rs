//! String encodings used by the wire protocol. Character names round-trip
//! through CP932 (Shift-JIS), most other text is UTF-8, a handful of legacy
//! fields use UTF-16LE.

use encoding_rs::{SHIFT_JIS, UTF_16LE};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Utf8,
    Cp932,
    Utf16Le,
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("invalid {0:?} byte sequence")]
    InvalidBytes(StringEncoding),
}

impl StringEncoding {
    /// Decodes `bytes` (without any length prefix or null terminator) into a
    /// `String`, failing if the bytes are not valid in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Result<String, EncodingError> {
        match self {
            StringEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| EncodingError::InvalidBytes(self)),
            StringEncoding::Cp932 => {
                let (text, _, had_errors) = SHIFT_JIS.decode(bytes);
                if had_errors {
                    return Err(EncodingError::InvalidBytes(self));
                }
                Ok(text.into_owned())
            }
            StringEncoding::Utf16Le => {
                let (text, _, had_errors) = UTF_16LE.decode(bytes);
                if had_errors {
                    return Err(EncodingError::InvalidBytes(self));
                }
                Ok(text.into_owned())
            }
        }
    }

    /// Encodes `value` into this encoding's byte representation, not
    /// including any length prefix or null terminator.
    pub fn encode(self, value: &str) -> Vec<u8> {
        match self {
            StringEncoding::Utf8 => value.as_bytes().to_vec(),
            StringEncoding::Cp932 => {
                let (bytes, _, _) = SHIFT_JIS.encode(value);
                bytes.into_owned()
            }
            StringEncoding::Utf16Le => {
                let (bytes, _, _) = UTF_16LE.encode(value);
                bytes.into_owned()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn utf8_round_trips() {
        let encoded = StringEncoding::Utf8.encode("user_a");
        let decoded = StringEncoding::Utf8.decode(&encoded).unwrap();
        assert_eq!(decoded, "user_a");
    }

    #[test]
    fn cp932_round_trips_ascii() {
        let encoded = StringEncoding::Cp932.encode("Tester");
        let decoded = StringEncoding::Cp932.decode(&encoded).unwrap();
        assert_eq!(decoded, "Tester");
    }

    #[test]
    fn utf16le_round_trips() {
        let encoded = StringEncoding::Utf16Le.encode("abc");
        assert_eq!(encoded.len(), 6);
        let decoded = StringEncoding::Utf16Le.decode(&encoded).unwrap();
        assert_eq!(decoded, "abc");
    }
}
