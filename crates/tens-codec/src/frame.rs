use crate::errors::CodecError;

/// Stream magic bytes: `b"TENS"`.
pub const MAGIC: &[u8; 4] = b"TENS";

/// Current format version. Version 3 carries a type tag per schema field.
pub const FORMAT_VERSION: u8 = 3;

/// Longest encoding name the one-byte length prefix can hold.
pub const MAX_ENCODING_NAME_LEN: usize = u8::MAX as usize;

/// Size of one token in bytes.
pub const TOKEN_SIZE: usize = 4;

/// Stream header: magic, version, encoding name and token count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Format version.
    pub version: u8,
    /// Tokenizer encoding the vocabulary ids belong to.
    pub encoding_name: String,
    /// Number of tokens following the header.
    pub token_count: u32,
}

impl FrameHeader {
    /// Creates a header for the current format version.
    pub fn new(encoding_name: &str, token_count: usize) -> Result<Self, CodecError> {
        if encoding_name.len() > MAX_ENCODING_NAME_LEN {
            return Err(CodecError::InvalidEncodingName(format!(
                "{} bytes exceeds {}",
                encoding_name.len(),
                MAX_ENCODING_NAME_LEN
            )));
        }
        let token_count =
            u32::try_from(token_count).map_err(|_| CodecError::StreamTooLong(token_count))?;
        Ok(Self {
            version: FORMAT_VERSION,
            encoding_name: encoding_name.to_string(),
            token_count,
        })
    }

    /// Serialized header length in bytes.
    pub fn encoded_len(&self) -> usize {
        MAGIC.len() + 1 + 1 + self.encoding_name.len() + 4
    }

    /// Appends the serialized header to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(MAGIC);
        out.push(self.version);
        out.push(self.encoding_name.len() as u8);
        out.extend_from_slice(self.encoding_name.as_bytes());
        out.extend_from_slice(&self.token_count.to_le_bytes());
    }

    /// Parses a header, returning it with the offset of the first token.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let magic = take(bytes, 0, MAGIC.len())?;
        if magic != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(CodecError::BadMagic {
                found,
                expected: *MAGIC,
            });
        }

        let version = take(bytes, 4, 1)?[0];
        if version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let name_len = take(bytes, 5, 1)?[0] as usize;
        let name_bytes = take(bytes, 6, name_len)?;
        let encoding_name = std::str::from_utf8(name_bytes)
            .map_err(|e| CodecError::InvalidEncodingName(e.to_string()))?
            .to_string();

        let count_at = 6 + name_len;
        let count_bytes = take(bytes, count_at, 4)?;
        let token_count = u32::from_le_bytes([
            count_bytes[0],
            count_bytes[1],
            count_bytes[2],
            count_bytes[3],
        ]);

        Ok((
            Self {
                version,
                encoding_name,
                token_count,
            },
            count_at + 4,
        ))
    }
}

fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], CodecError> {
    bytes
        .get(offset..offset + len)
        .ok_or_else(|| CodecError::Truncated {
            offset: bytes.len(),
            needed: offset + len - bytes.len(),
        })
}

/// Serializes a token stream with its header.
pub fn write_frame(encoding_name: &str, tokens: &[u32]) -> Result<Vec<u8>, CodecError> {
    let header = FrameHeader::new(encoding_name, tokens.len())?;
    let mut out = Vec::with_capacity(header.encoded_len() + tokens.len() * TOKEN_SIZE);
    header.write_to(&mut out);
    for token in tokens {
        out.extend_from_slice(&token.to_le_bytes());
    }
    Ok(out)
}

/// Parses a framed buffer into its header and tokens.
///
/// The payload must hold exactly `token_count` tokens.
pub fn read_frame(bytes: &[u8]) -> Result<(FrameHeader, Vec<u32>), CodecError> {
    let (header, start) = FrameHeader::from_bytes(bytes)?;
    let payload = &bytes[start..];
    let expected = header.token_count as usize * TOKEN_SIZE;

    if payload.len() < expected {
        return Err(CodecError::Truncated {
            offset: bytes.len(),
            needed: expected - payload.len(),
        });
    }
    if payload.len() > expected {
        return Err(CodecError::TrailingBytes {
            offset: start + expected,
            extra: payload.len() - expected,
        });
    }

    let tokens = payload
        .chunks_exact(TOKEN_SIZE)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((header, tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let bytes = write_frame("bytes", &[1, 2, 1_000_000]).unwrap();
        assert_eq!(&bytes[0..4], b"TENS");
        assert_eq!(bytes[4], FORMAT_VERSION);
        assert_eq!(bytes[5], 5);
        assert_eq!(&bytes[6..11], b"bytes");
        assert_eq!(&bytes[11..15], &3u32.to_le_bytes());

        let (header, tokens) = read_frame(&bytes).unwrap();
        assert_eq!(header.encoding_name, "bytes");
        assert_eq!(header.token_count, 3);
        assert_eq!(tokens, vec![1, 2, 1_000_000]);
    }

    #[test]
    fn header_rejects_invalid_magic() {
        let mut bytes = write_frame("bytes", &[]).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            read_frame(&bytes),
            Err(CodecError::BadMagic { found, .. }) if found == *b"XENS"
        ));
    }

    #[test]
    fn header_rejects_unknown_version() {
        let mut bytes = write_frame("bytes", &[]).unwrap();
        bytes[4] = 2;
        assert!(matches!(
            read_frame(&bytes),
            Err(CodecError::UnsupportedVersion { found: 2, expected: 3 })
        ));
    }

    #[test]
    fn short_buffers_are_truncated_not_bad_magic() {
        assert!(matches!(read_frame(b"TE"), Err(CodecError::Truncated { .. })));
        assert!(matches!(read_frame(b"TENS"), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn payload_length_must_match_token_count() {
        let bytes = write_frame("bytes", &[7, 8]).unwrap();
        assert!(matches!(
            read_frame(&bytes[..bytes.len() - 1]),
            Err(CodecError::Truncated { needed: 1, .. })
        ));

        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0, 0]);
        assert!(matches!(
            read_frame(&padded),
            Err(CodecError::TrailingBytes { extra: 2, .. })
        ));
    }

    #[test]
    fn encoding_name_length_is_limited() {
        let name = "x".repeat(MAX_ENCODING_NAME_LEN + 1);
        assert!(matches!(
            write_frame(&name, &[]),
            Err(CodecError::InvalidEncodingName(_))
        ));
    }
}
