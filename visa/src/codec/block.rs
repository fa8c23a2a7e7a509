//! IEEE-488.2 and HP binary block headers.
//!
//! IEEE definite blocks are framed `#<d><L><payload>` where `d` (1..=9)
//! gives the digit count of the decimal length `L`. `#0` starts an
//! indefinite block terminated by the caller's stop condition. HP blocks
//! are framed `#A<lo><hi>` with a little-endian 16-bit length. Instruments
//! may emit a bounded amount of junk before the `#` sentinel; the scanners
//! search a caller-supplied window (default 25 bytes) and fail beyond it.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// How many leading bytes are searched for the `#` sentinel by default.
pub const DEFAULT_HEADER_SCAN_WINDOW: usize = 25;

/// A decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockHeader {
    /// IEEE-488.2 block; `len` is `None` for the indefinite `#0` form.
    Ieee { len: Option<u64> },
    /// HP block with a 16-bit little-endian length.
    Hp { len: u16 },
    /// No framing; the whole stream is payload.
    Empty,
}

impl BlockHeader {
    /// Declared payload length: `-1` for indefinite blocks, `None` when the
    /// stream is unframed.
    pub fn data_length(&self) -> Option<i64> {
        match self {
            BlockHeader::Ieee { len: Some(len) } => Some(*len as i64),
            BlockHeader::Ieee { len: None } => Some(-1),
            BlockHeader::Hp { len } => Some(*len as i64),
            BlockHeader::Empty => None,
        }
    }
}

/// Header found in a buffer: the header plus the offset of the first
/// payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedHeader {
    pub header: BlockHeader,
    pub payload_offset: usize,
}

/// Outcome of scanning a (possibly still growing) buffer for a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// More bytes are needed before the header can be decided.
    Incomplete,
    Found(LocatedHeader),
}

fn find_sentinel(buf: &[u8], scan_window: usize) -> Result<Option<usize>> {
    let window = buf.len().min(scan_window);
    if let Some(pos) = buf[..window].iter().position(|&b| b == b'#') {
        return Ok(Some(pos));
    }
    if buf.len() >= scan_window {
        return Err(Error::protocol(format!(
            "block sentinel '#' not found within the first {scan_window} bytes"
        )));
    }
    Ok(None)
}

/// Scan for an IEEE-488.2 header.
pub fn scan_ieee(buf: &[u8], scan_window: usize) -> Result<Scan> {
    let pos = match find_sentinel(buf, scan_window)? {
        Some(pos) => pos,
        None => return Ok(Scan::Incomplete),
    };

    let Some(&digit) = buf.get(pos + 1) else {
        return Ok(Scan::Incomplete);
    };
    if !digit.is_ascii_digit() {
        return Err(Error::protocol(format!(
            "invalid IEEE block digit {:?} after '#'",
            digit as char
        )));
    }

    if digit == b'0' {
        return Ok(Scan::Found(LocatedHeader {
            header: BlockHeader::Ieee { len: None },
            payload_offset: pos + 2,
        }));
    }

    let ndigits = (digit - b'0') as usize;
    let len_end = pos + 2 + ndigits;
    if buf.len() < len_end {
        return Ok(Scan::Incomplete);
    }

    let mut len: u64 = 0;
    for &b in &buf[pos + 2..len_end] {
        if !b.is_ascii_digit() {
            return Err(Error::protocol(format!(
                "non-digit {:?} in IEEE block length",
                b as char
            )));
        }
        len = len * 10 + (b - b'0') as u64;
    }

    Ok(Scan::Found(LocatedHeader {
        header: BlockHeader::Ieee { len: Some(len) },
        payload_offset: len_end,
    }))
}

/// Scan for an HP `#A` header.
pub fn scan_hp(buf: &[u8], scan_window: usize) -> Result<Scan> {
    let pos = match find_sentinel(buf, scan_window)? {
        Some(pos) => pos,
        None => return Ok(Scan::Incomplete),
    };

    match buf.get(pos + 1) {
        None => return Ok(Scan::Incomplete),
        Some(b'A') | Some(b'a') => {}
        Some(&other) => {
            return Err(Error::protocol(format!(
                "expected 'A' after '#' in HP block, found {:?}",
                other as char
            )));
        }
    }

    if buf.len() < pos + 4 {
        return Ok(Scan::Incomplete);
    }
    let len = LittleEndian::read_u16(&buf[pos + 2..pos + 4]);
    Ok(Scan::Found(LocatedHeader {
        header: BlockHeader::Hp { len },
        payload_offset: pos + 4,
    }))
}

/// Encode an IEEE-488.2 definite-length header for `len` payload bytes.
pub fn ieee_header(len: u64) -> Vec<u8> {
    let digits = len.to_string();
    debug_assert!(digits.len() <= 9);
    let mut out = Vec::with_capacity(2 + digits.len());
    out.push(b'#');
    out.push(b'0' + digits.len() as u8);
    out.extend_from_slice(digits.as_bytes());
    out
}

/// Encode the IEEE-488.2 indefinite-length header `#0`.
pub fn ieee_header_indefinite() -> Vec<u8> {
    vec![b'#', b'0']
}

/// Encode an HP header; the length field is 16 bits.
pub fn hp_header(len: usize) -> Result<Vec<u8>> {
    let len = u16::try_from(len)
        .map_err(|_| Error::protocol(format!("payload of {len} bytes exceeds the HP block limit")))?;
    let mut out = vec![b'#', b'A', 0, 0];
    LittleEndian::write_u16(&mut out[2..4], len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(scan: Scan) -> LocatedHeader {
        match scan {
            Scan::Found(located) => located,
            Scan::Incomplete => panic!("header unexpectedly incomplete"),
        }
    }

    #[test]
    fn ieee_definite() {
        let located = found(scan_ieee(b"#18ABCDEFGH\n", DEFAULT_HEADER_SCAN_WINDOW).unwrap());
        assert_eq!(located.header, BlockHeader::Ieee { len: Some(8) });
        assert_eq!(located.payload_offset, 3);
        assert_eq!(located.header.data_length(), Some(8));
    }

    #[test]
    fn ieee_indefinite() {
        let located = found(scan_ieee(b"#0payload\n", DEFAULT_HEADER_SCAN_WINDOW).unwrap());
        assert_eq!(located.header, BlockHeader::Ieee { len: None });
        assert_eq!(located.payload_offset, 2);
        assert_eq!(located.header.data_length(), Some(-1));
    }

    #[test]
    fn ieee_zero_length() {
        let located = found(scan_ieee(b"#10", DEFAULT_HEADER_SCAN_WINDOW).unwrap());
        assert_eq!(located.header, BlockHeader::Ieee { len: Some(0) });
        assert_eq!(located.payload_offset, 3);
    }

    #[test]
    fn ieee_gigabyte_length() {
        let len: u64 = 1 << 30;
        let mut buf = ieee_header(len);
        buf.extend_from_slice(b"only the header matters here");
        let located = found(scan_ieee(&buf, DEFAULT_HEADER_SCAN_WINDOW).unwrap());
        assert_eq!(located.header, BlockHeader::Ieee { len: Some(len) });
        assert_eq!(located.payload_offset, 2 + 10);
    }

    #[test]
    fn sentinel_scan_window() {
        // Sentinel at position 0 and at position 24 succeed.
        let at_zero = found(scan_ieee(b"#14abcd", 25).unwrap());
        assert_eq!(at_zero.payload_offset, 3);

        let mut buf = vec![b' '; 24];
        buf.extend_from_slice(b"#14abcd");
        let at_24 = found(scan_ieee(&buf, 25).unwrap());
        assert_eq!(at_24.payload_offset, 24 + 3);

        // Sentinel at position 25 is beyond the default window.
        let mut buf = vec![b' '; 25];
        buf.extend_from_slice(b"#14abcd");
        assert!(scan_ieee(&buf, 25).is_err());
    }

    #[test]
    fn incomplete_buffers() {
        assert_eq!(scan_ieee(b"", 25).unwrap(), Scan::Incomplete);
        assert_eq!(scan_ieee(b"junk#", 25).unwrap(), Scan::Incomplete);
        assert_eq!(scan_ieee(b"#3", 25).unwrap(), Scan::Incomplete);
        assert_eq!(scan_ieee(b"#312", 25).unwrap(), Scan::Incomplete);
        assert_eq!(scan_hp(b"#A\x10", 25).unwrap(), Scan::Incomplete);
    }

    #[test]
    fn malformed_headers() {
        assert!(scan_ieee(b"#x123", 25).is_err());
        assert!(scan_hp(b"#B\x01\x00", 25).is_err());
    }

    #[test]
    fn hp_round_trip() {
        let header = hp_header(0x1234).unwrap();
        assert_eq!(header, vec![b'#', b'A', 0x34, 0x12]);
        let located = found(scan_hp(&header, 25).unwrap());
        assert_eq!(located.header, BlockHeader::Hp { len: 0x1234 });
        assert_eq!(located.payload_offset, 4);

        assert!(hp_header(0x1_0000).is_err());
    }

    #[test]
    fn ieee_header_encoding() {
        assert_eq!(ieee_header(0), b"#10");
        assert_eq!(ieee_header(8), b"#18");
        assert_eq!(ieee_header(123), b"#3123");
        assert_eq!(ieee_header_indefinite(), b"#0");
    }
}
