//! Framing and value codecs used by the message-based transfer engine:
//! IEEE-488.2 / HP binary block headers and ASCII value streams.

pub mod block;
pub mod values;

pub use block::{
    hp_header, ieee_header, ieee_header_indefinite, scan_hp, scan_ieee, BlockHeader,
    LocatedHeader, Scan, DEFAULT_HEADER_SCAN_WINDOW,
};
pub use values::{
    format_ascii_values, pack, pack_prefixed, parse_ascii_values, unpack, unpack_prefixed, Datum,
    DEFAULT_SEPARATOR,
};
