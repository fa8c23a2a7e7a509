//! Process-wide attribute registry.
//!
//! The registry is data, not types: one immutable descriptor per attribute
//! with access rights, value kind, range and default. Resource properties
//! are thin `get_attr`/`set_attr` wrappers validated against this table.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::constants::{AttrId, TIMEOUT_INFINITE};

/// Value shape of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I16,
    /// Enumerated u16 value (parity, stop bits, end modes, ...).
    Enum,
    /// Bit-flag set carried as u16.
    Flags,
    Str,
}

/// Default value recorded in the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrDefault {
    None,
    Bool(bool),
    UInt(u64),
    Str(&'static str),
}

/// Descriptor of one VISA attribute.
#[derive(Debug, Clone)]
pub struct AttrDescriptor {
    pub id: AttrId,
    pub name: &'static str,
    pub readable: bool,
    pub writable: bool,
    pub kind: AttrKind,
    /// Inclusive numeric range, when the attribute is range-limited.
    pub range: Option<(u64, u64)>,
    pub default: AttrDefault,
}

macro_rules! descriptors {
    ($($id:ident, $rw:tt, $kind:ident, $range:expr, $default:expr;)*) => {
        &[$(
            AttrDescriptor {
                id: AttrId::$id,
                name: stringify!($id),
                readable: descriptors!(@r $rw),
                writable: descriptors!(@w $rw),
                kind: AttrKind::$kind,
                range: $range,
                default: $default,
            },
        )*]
    };
    (@r RO) => { true };
    (@r RW) => { true };
    (@r WO) => { false };
    (@w RO) => { false };
    (@w RW) => { true };
    (@w WO) => { true };
}

/// Every attribute the resource layer touches.
pub static ATTRIBUTES: &[AttrDescriptor] = descriptors! {
    RSRC_CLASS, RO, Str, None, AttrDefault::None;
    RSRC_NAME, RO, Str, None, AttrDefault::None;
    RSRC_IMPL_VERSION, RO, U32, None, AttrDefault::None;
    RSRC_SPEC_VERSION, RO, U32, None, AttrDefault::None;
    RSRC_MANF_NAME, RO, Str, None, AttrDefault::None;
    RSRC_MANF_ID, RO, U16, None, AttrDefault::None;
    RSRC_LOCK_STATE, RO, U32, None, AttrDefault::UInt(0);
    MAX_QUEUE_LENGTH, RW, U32, Some((1, u32::MAX as u64)), AttrDefault::UInt(50);
    TMO_VALUE, RW, U32, None, AttrDefault::UInt(2000);
    TERMCHAR, RW, U8, Some((0, 0xFF)), AttrDefault::UInt(b'\n' as u64);
    TERMCHAR_EN, RW, Bool, None, AttrDefault::Bool(false);
    SEND_END_EN, RW, Bool, None, AttrDefault::Bool(true);
    SUPPRESS_END_EN, RW, Bool, None, AttrDefault::Bool(false);
    IO_PROT, RW, Enum, Some((1, 5)), AttrDefault::UInt(1);
    INTF_TYPE, RO, U16, None, AttrDefault::None;
    INTF_NUM, RO, U16, None, AttrDefault::UInt(0);
    TRIG_ID, RW, I16, None, AttrDefault::None;
    RM_SESSION, RO, U32, None, AttrDefault::None;
    DEV_STATUS_BYTE, RO, U8, None, AttrDefault::None;

    ASRL_BAUD, RW, U32, Some((1, 4_000_000)), AttrDefault::UInt(9600);
    ASRL_DATA_BITS, RW, U16, Some((5, 8)), AttrDefault::UInt(8);
    ASRL_PARITY, RW, Enum, Some((0, 4)), AttrDefault::UInt(0);
    ASRL_STOP_BITS, RW, Enum, Some((10, 20)), AttrDefault::UInt(10);
    ASRL_FLOW_CNTRL, RW, Flags, Some((0, 7)), AttrDefault::UInt(0);
    ASRL_END_IN, RW, Enum, Some((0, 3)), AttrDefault::UInt(2);
    ASRL_END_OUT, RW, Enum, Some((0, 3)), AttrDefault::UInt(0);
    ASRL_XON_CHAR, RW, U8, Some((0, 0xFF)), AttrDefault::UInt(0x11);
    ASRL_XOFF_CHAR, RW, U8, Some((0, 0xFF)), AttrDefault::UInt(0x13);
    ASRL_BREAK_STATE, RW, I16, None, AttrDefault::UInt(0);
    ASRL_BREAK_LEN, RW, I16, Some((1, 500)), AttrDefault::UInt(250);
    ASRL_AVAIL_NUM, RO, U32, None, AttrDefault::UInt(0);
    ASRL_CTS_STATE, RO, I16, None, AttrDefault::None;
    ASRL_DCD_STATE, RO, I16, None, AttrDefault::None;
    ASRL_DSR_STATE, RO, I16, None, AttrDefault::None;
    ASRL_DTR_STATE, RW, I16, None, AttrDefault::None;
    ASRL_RI_STATE, RO, I16, None, AttrDefault::None;
    ASRL_RTS_STATE, RW, I16, None, AttrDefault::None;

    GPIB_PRIMARY_ADDR, RO, U16, Some((0, 30)), AttrDefault::None;
    GPIB_SECONDARY_ADDR, RO, U16, None, AttrDefault::UInt(0xFFFF);
    GPIB_REN_STATE, RO, I16, None, AttrDefault::None;
    GPIB_ATN_STATE, RO, I16, None, AttrDefault::None;
    GPIB_SRQ_STATE, RO, I16, None, AttrDefault::None;
    GPIB_CIC_STATE, RO, I16, None, AttrDefault::None;
    GPIB_ADDR_STATE, RO, I16, None, AttrDefault::None;

    TCPIP_ADDR, RO, Str, None, AttrDefault::None;
    TCPIP_HOSTNAME, RO, Str, None, AttrDefault::None;
    TCPIP_PORT, RO, U16, None, AttrDefault::None;
    TCPIP_DEVICE_NAME, RO, Str, None, AttrDefault::Str("inst0");
    TCPIP_NODELAY, RW, Bool, None, AttrDefault::Bool(true);
    TCPIP_KEEPALIVE, RW, Bool, None, AttrDefault::Bool(false);

    MANF_ID, RO, U16, None, AttrDefault::None;
    MODEL_CODE, RO, U16, None, AttrDefault::None;
    USB_SERIAL_NUM, RO, Str, None, AttrDefault::None;
    USB_INTFC_NUM, RO, U16, None, AttrDefault::None;
    USB_PROTOCOL, RO, U16, None, AttrDefault::None;
    USB_MAX_INTR_SIZE, RW, U16, None, AttrDefault::None;

    WIN_ACCESS, RO, U16, None, AttrDefault::UInt(1);
    WIN_BASE_ADDR, RO, U64, None, AttrDefault::None;
    WIN_SIZE, RO, U64, None, AttrDefault::None;
    SRC_BYTE_ORDER, RW, Enum, Some((0, 1)), AttrDefault::UInt(0);
    DEST_BYTE_ORDER, RW, Enum, Some((0, 1)), AttrDefault::UInt(0);
    SRC_INCREMENT, RW, U32, Some((0, 1)), AttrDefault::UInt(1);
    DEST_INCREMENT, RW, U32, Some((0, 1)), AttrDefault::UInt(1);

    EVENT_TYPE, RO, U32, None, AttrDefault::None;
    STATUS, RO, U32, None, AttrDefault::None;
    JOB_ID, RO, U32, None, AttrDefault::None;
    RET_COUNT, RO, U64, None, AttrDefault::None;
    BUFFER, RO, U64, None, AttrDefault::None;
    RECV_TRIG_ID, RO, I16, None, AttrDefault::None;
    SIGP_STATUS_ID, RO, U16, None, AttrDefault::None;
    OPER_NAME, RO, Str, None, AttrDefault::None;
};

static BY_ID: Lazy<HashMap<u32, &'static AttrDescriptor>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(ATTRIBUTES.len());
    for descriptor in ATTRIBUTES {
        let prev = map.insert(descriptor.id.0, descriptor);
        debug_assert!(prev.is_none(), "duplicate attribute id {:?}", descriptor.id);
    }
    map
});

/// Look up the descriptor for an attribute id.
pub fn lookup(id: AttrId) -> Option<&'static AttrDescriptor> {
    BY_ID.get(&id.0).copied()
}

/// All registered descriptors.
pub fn all() -> &'static [AttrDescriptor] {
    ATTRIBUTES
}

/// Check a numeric value against the registered range, if any.
pub fn in_range(id: AttrId, value: u64) -> bool {
    match lookup(id).and_then(|d| d.range) {
        Some((lo, hi)) => value >= lo && value <= hi,
        None => true,
    }
}

/// Sentinel check helper: the timeout attribute treats `0xFFFFFFFF` as
/// infinite rather than as a numeric bound.
pub fn is_infinite_timeout(raw: u32) -> bool {
    raw == TIMEOUT_INFINITE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_consistent() {
        // Forcing the index checks the duplicate-id debug assertion.
        assert!(lookup(AttrId::TMO_VALUE).is_some());
        assert_eq!(BY_ID.len(), ATTRIBUTES.len());
    }

    #[test]
    fn descriptor_fields() {
        let termchar = lookup(AttrId::TERMCHAR).unwrap();
        assert!(termchar.readable && termchar.writable);
        assert_eq!(termchar.kind, AttrKind::U8);
        assert_eq!(termchar.default, AttrDefault::UInt(b'\n' as u64));

        let class = lookup(AttrId::RSRC_CLASS).unwrap();
        assert!(class.readable && !class.writable);
        assert_eq!(class.kind, AttrKind::Str);
    }

    #[test]
    fn range_validation() {
        assert!(in_range(AttrId::ASRL_DATA_BITS, 8));
        assert!(!in_range(AttrId::ASRL_DATA_BITS, 9));
        assert!(!in_range(AttrId::ASRL_DATA_BITS, 4));
        // Unregistered or unbounded attributes pass.
        assert!(in_range(AttrId::RSRC_NAME, 12345));
    }
}
