//! Record file parser using nom
//!
//! File format:
//! ```text
//! PCDB001\n
//! [version: u32]
//! ...records...
//! ```
//!
//! Record format:
//! ```text
//! [32 bytes: key]
//! [4 bytes: value length u32 little-endian]
//! [length bytes: value]
//! ```

use nom::{
    bytes::complete::{tag, take},
    multi::length_data,
    number::complete::le_u32,
    sequence::preceded,
    IResult,
};

use crate::error::{Error, Result};
use crate::key::{Hash256, KEY_SIZE};

/// Magic header for precompute data files
pub const PCDB_MAGIC: &[u8] = b"PCDB001\n";

/// Current data file version
pub const PCDB_VERSION: u32 = 1;

/// Total header length in bytes
pub const HEADER_LEN: usize = PCDB_MAGIC.len() + 4;

/// Fixed overhead of every record on disk
pub const RECORD_OVERHEAD: usize = KEY_SIZE + 4;

/// A record borrowed from the data file
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRef<'a> {
    /// Record key
    pub key: Hash256,
    /// Raw value bytes
    pub value: &'a [u8],
}

fn header(input: &[u8]) -> IResult<&[u8], u32> {
    preceded(tag(PCDB_MAGIC), le_u32)(input)
}

/// Parse the data file header, returning the file version
pub fn parse_header(input: &[u8]) -> Result<u32> {
    if input.len() < HEADER_LEN {
        return Err(Error::Parse("Input too short for header".to_string()));
    }

    let (_, version) = header(input)?;
    if version != PCDB_VERSION {
        return Err(Error::Parse(format!("Unsupported file version {}", version)));
    }

    Ok(version)
}

/// Create a data file header
pub fn create_header(version: u32) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(PCDB_MAGIC);
    header.extend_from_slice(&version.to_le_bytes());
    header
}

/// Parse a single record
pub fn parse_record(input: &[u8]) -> IResult<&[u8], RecordRef<'_>> {
    let (input, key) = take(KEY_SIZE)(input)?;
    let (input, value) = length_data(le_u32)(input)?;

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(key);

    Ok((
        input,
        RecordRef {
            key: Hash256::new(bytes),
            value,
        },
    ))
}

/// Encode a record for appending to the data file
pub fn encode_record(key: &Hash256, value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_OVERHEAD + value.len());
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let header = create_header(PCDB_VERSION);
        assert_eq!(header.len(), HEADER_LEN);
        assert_eq!(parse_header(&header).unwrap(), PCDB_VERSION);
    }

    #[test]
    fn test_parse_header_invalid_magic() {
        let mut header = create_header(PCDB_VERSION);
        header[0] = b'X'; // Corrupt magic

        assert!(parse_header(&header).is_err());
    }

    #[test]
    fn test_parse_header_too_short() {
        assert!(parse_header(b"PCDB001\n").is_err());
    }

    #[test]
    fn test_parse_header_wrong_version() {
        let header = create_header(7);
        assert!(matches!(parse_header(&header), Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_consecutive_records() {
        let k1 = Hash256::new([1u8; KEY_SIZE]);
        let k2 = Hash256::new([2u8; KEY_SIZE]);
        let mut buf = encode_record(&k1, b"witness one");
        buf.extend_from_slice(&encode_record(&k2, b""));

        let (rest, first) = parse_record(&buf).unwrap();
        assert_eq!(first.key, k1);
        assert_eq!(first.value, b"witness one");

        let (rest, second) = parse_record(rest).unwrap();
        assert_eq!(second.key, k2);
        assert!(second.value.is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn test_parse_truncated_record() {
        let key = Hash256::new([9u8; KEY_SIZE]);
        let buf = encode_record(&key, b"0123456789");

        assert!(parse_record(&buf[..buf.len() - 3]).is_err());
        assert!(parse_record(&buf[..KEY_SIZE + 2]).is_err());
    }
}
