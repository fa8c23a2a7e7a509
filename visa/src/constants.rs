//! VISA constants: interface types, serial line settings, access modes,
//! event types and the status-code space.
//!
//! Numeric values follow the VISA specification so they can be passed to a
//! foreign implementation unchanged.

use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

use bitflags::bitflags;

/// Default pattern used by resource discovery.
pub const DEFAULT_FIND_PATTERN: &str = "?*::INSTR";

/// GPIB secondary address "not present" sentinel.
pub const NO_SEC_ADDR: u16 = 0xFFFF;

/// Offset applied to a secondary address (0..=30) on the wire.
pub const SEC_ADDR_BIAS: u16 = 96;

/// Raw attribute value meaning "fail immediately".
pub const TIMEOUT_IMMEDIATE: u32 = 0;

/// Raw attribute value meaning "never time out".
pub const TIMEOUT_INFINITE: u32 = 0xFFFF_FFFF;

/// The unknown-at-publication VICP interface-type value, configurable at
/// runtime for implementations that assign their own.
static VICP_INTERFACE_TYPE: AtomicU16 = AtomicU16::new(36);

/// Override the numeric value reported for [`InterfaceType::Vicp`].
pub fn set_vicp_interface_type(value: u16) {
    VICP_INTERFACE_TYPE.store(value, Ordering::Relaxed);
}

/// Bus family of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum InterfaceType {
    Gpib,
    Vxi,
    GpibVxi,
    Asrl,
    Pxi,
    Tcpip,
    Usb,
    Rio,
    Firewire,
    Vicp,
    Unknown(u16),
}

impl InterfaceType {
    /// VISA numeric value of the interface type.
    pub fn value(&self) -> u16 {
        match self {
            InterfaceType::Gpib => 1,
            InterfaceType::Vxi => 2,
            InterfaceType::GpibVxi => 3,
            InterfaceType::Asrl => 4,
            InterfaceType::Pxi => 5,
            InterfaceType::Tcpip => 6,
            InterfaceType::Usb => 7,
            InterfaceType::Rio => 8,
            InterfaceType::Firewire => 9,
            InterfaceType::Vicp => VICP_INTERFACE_TYPE.load(Ordering::Relaxed),
            InterfaceType::Unknown(x) => *x,
        }
    }

    pub fn from_value(value: u16) -> Self {
        match value {
            1 => InterfaceType::Gpib,
            2 => InterfaceType::Vxi,
            3 => InterfaceType::GpibVxi,
            4 => InterfaceType::Asrl,
            5 => InterfaceType::Pxi,
            6 => InterfaceType::Tcpip,
            7 => InterfaceType::Usb,
            8 => InterfaceType::Rio,
            9 => InterfaceType::Firewire,
            x if x == VICP_INTERFACE_TYPE.load(Ordering::Relaxed) => InterfaceType::Vicp,
            x => InterfaceType::Unknown(x),
        }
    }

    /// Canonical resource-name prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            InterfaceType::Gpib => "GPIB",
            InterfaceType::Vxi => "VXI",
            InterfaceType::GpibVxi => "GPIB-VXI",
            InterfaceType::Asrl => "ASRL",
            InterfaceType::Pxi => "PXI",
            InterfaceType::Tcpip => "TCPIP",
            InterfaceType::Usb => "USB",
            InterfaceType::Rio => "RIO",
            InterfaceType::Firewire => "FIREWIRE",
            InterfaceType::Vicp => "VICP",
            InterfaceType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Resource class suffix of a resource name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Instr,
    Intfc,
    Backplane,
    Memacc,
    Servant,
    Socket,
    Raw,
}

impl ResourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Instr => "INSTR",
            ResourceClass::Intfc => "INTFC",
            ResourceClass::Backplane => "BACKPLANE",
            ResourceClass::Memacc => "MEMACC",
            ResourceClass::Servant => "SERVANT",
            ResourceClass::Socket => "SOCKET",
            ResourceClass::Raw => "RAW",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "INSTR" => Some(ResourceClass::Instr),
            "INTFC" => Some(ResourceClass::Intfc),
            "BACKPLANE" => Some(ResourceClass::Backplane),
            "MEMACC" => Some(ResourceClass::Memacc),
            "SERVANT" => Some(ResourceClass::Servant),
            "SOCKET" => Some(ResourceClass::Socket),
            "RAW" => Some(ResourceClass::Raw),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Mode requested when opening a session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AccessMode: u32 {
        const NO_LOCK = 0;
        const EXCLUSIVE_LOCK = 1;
        const SHARED_LOCK = 2;
        const LOAD_CONFIG = 4;
    }
}

/// Kind of cooperative lock to acquire on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Exclusive,
    Shared,
}

bitflags! {
    /// Delivery mechanisms for an enabled event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventMechanism: u16 {
        const QUEUE = 1;
        const HANDLER = 2;
        const SUSPEND_HANDLER = 4;
        const ALL = 0xFFFF;
    }
}

bitflags! {
    /// Buffer selector for flush operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FlushMask: u16 {
        const READ_BUF = 1;
        const WRITE_BUF = 2;
        const READ_BUF_DISCARD = 4;
        const WRITE_BUF_DISCARD = 8;
        const IO_IN_BUF = 16;
        const IO_OUT_BUF = 32;
        const IO_IN_BUF_DISCARD = 64;
        const IO_OUT_BUF_DISCARD = 128;
    }
}

bitflags! {
    /// Serial flow-control lines in use.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FlowControl: u16 {
        const NONE = 0;
        const XON_XOFF = 1;
        const RTS_CTS = 2;
        const DTR_DSR = 4;
    }
}

/// Serial frame parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    pub fn value(&self) -> u16 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }

    pub fn from_value(value: u16) -> Option<Self> {
        match value {
            0 => Some(Parity::None),
            1 => Some(Parity::Odd),
            2 => Some(Parity::Even),
            3 => Some(Parity::Mark),
            4 => Some(Parity::Space),
            _ => None,
        }
    }
}

/// Serial stop bits, stored in the VISA deci-bit encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    /// VISA encodes stop bits times ten (1 -> 10, 1.5 -> 15, 2 -> 20).
    pub fn deci_bits(&self) -> u16 {
        match self {
            StopBits::One => 10,
            StopBits::OnePointFive => 15,
            StopBits::Two => 20,
        }
    }

    pub fn from_deci_bits(value: u16) -> Option<Self> {
        match value {
            10 => Some(StopBits::One),
            15 => Some(StopBits::OnePointFive),
            20 => Some(StopBits::Two),
            _ => None,
        }
    }
}

/// Policy ending a serial read operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialEnd {
    None,
    LastBit,
    Termchar,
    Break,
}

impl SerialEnd {
    pub fn value(&self) -> u16 {
        match self {
            SerialEnd::None => 0,
            SerialEnd::LastBit => 1,
            SerialEnd::Termchar => 2,
            SerialEnd::Break => 3,
        }
    }

    pub fn from_value(value: u16) -> Option<Self> {
        match value {
            0 => Some(SerialEnd::None),
            1 => Some(SerialEnd::LastBit),
            2 => Some(SerialEnd::Termchar),
            3 => Some(SerialEnd::Break),
            _ => None,
        }
    }
}

/// Line state of a serial modem line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Asserted,
    Unasserted,
    Unknown,
}

impl LineState {
    pub fn from_value(value: i16) -> Self {
        match value {
            1 => LineState::Asserted,
            0 => LineState::Unasserted,
            _ => LineState::Unknown,
        }
    }
}

/// I/O protocol used by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoProtocol {
    Normal,
    Fdc,
    Hs488,
    Ieee4882Strings,
    UsbtmcVendor,
}

impl IoProtocol {
    pub fn value(&self) -> u16 {
        match self {
            IoProtocol::Normal => 1,
            IoProtocol::Fdc => 2,
            IoProtocol::Hs488 => 3,
            IoProtocol::Ieee4882Strings => 4,
            IoProtocol::UsbtmcVendor => 5,
        }
    }

    pub fn from_value(value: u16) -> Option<Self> {
        match value {
            1 => Some(IoProtocol::Normal),
            2 => Some(IoProtocol::Fdc),
            3 => Some(IoProtocol::Hs488),
            4 => Some(IoProtocol::Ieee4882Strings),
            5 => Some(IoProtocol::UsbtmcVendor),
            _ => None,
        }
    }
}

/// Address space selector for register-based access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpace {
    Local,
    A16,
    A24,
    A32,
    Opaque,
}

impl AddressSpace {
    pub fn value(&self) -> u16 {
        match self {
            AddressSpace::Local => 0,
            AddressSpace::A16 => 1,
            AddressSpace::A24 => 2,
            AddressSpace::A32 => 3,
            AddressSpace::Opaque => 0xFFFF,
        }
    }
}

/// Width of a register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    W8,
    W16,
    W32,
    W64,
}

impl DataWidth {
    pub fn bytes(&self) -> usize {
        match self {
            DataWidth::W8 => 1,
            DataWidth::W16 => 2,
            DataWidth::W32 => 4,
            DataWidth::W64 => 8,
        }
    }
}

/// GPIB remote-enable line action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenMode {
    Deassert,
    Assert,
    DeassertGtl,
    AssertAddress,
    AssertLlo,
    AssertAddressLlo,
    AddressGtl,
}

impl RenMode {
    pub fn value(&self) -> u16 {
        match self {
            RenMode::Deassert => 0,
            RenMode::Assert => 1,
            RenMode::DeassertGtl => 2,
            RenMode::AssertAddress => 3,
            RenMode::AssertLlo => 4,
            RenMode::AssertAddressLlo => 5,
            RenMode::AddressGtl => 6,
        }
    }
}

/// GPIB ATN line action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtnMode {
    Deassert,
    Assert,
    DeassertHandshake,
    AssertImmediate,
}

impl AtnMode {
    pub fn value(&self) -> u16 {
        match self {
            AtnMode::Deassert => 0,
            AtnMode::Assert => 1,
            AtnMode::DeassertHandshake => 2,
            AtnMode::AssertImmediate => 3,
        }
    }
}

/// Software trigger protocol passed to assert_trigger.
pub const TRIG_PROT_DEFAULT: u16 = 0;

/// Software trigger line identifier for the trigger-id attribute.
pub const TRIG_SW: i16 = -1;

/// Asynchronous event classes a session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventType {
    IoCompletion,
    Trig,
    ServiceRequest,
    Clear,
    Exception,
    GpibCic,
    GpibTalk,
    GpibListen,
    VxiVmeSysfail,
    VxiVmeSysreset,
    VxiSignal,
    VxiVmeIntr,
    PxiIntr,
    TcpipConnect,
    UsbIntr,
}

impl EventType {
    pub fn value(&self) -> u32 {
        match self {
            EventType::IoCompletion => 0x3FFF_2009,
            EventType::Trig => 0xBFFF_200A,
            EventType::ServiceRequest => 0x3FFF_200B,
            EventType::Clear => 0x3FFF_200D,
            EventType::Exception => 0xBFFF_200E,
            EventType::GpibCic => 0x3FFF_2012,
            EventType::GpibTalk => 0x3FFF_2013,
            EventType::GpibListen => 0x3FFF_2014,
            EventType::VxiVmeSysfail => 0x3FFF_201D,
            EventType::VxiVmeSysreset => 0x3FFF_201E,
            EventType::VxiSignal => 0x3FFF_2020,
            EventType::VxiVmeIntr => 0xBFFF_2021,
            EventType::PxiIntr => 0x3FFF_2022,
            EventType::TcpipConnect => 0x3FFF_2036,
            EventType::UsbIntr => 0x3FFF_2037,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0x3FFF_2009 => Some(EventType::IoCompletion),
            0xBFFF_200A => Some(EventType::Trig),
            0x3FFF_200B => Some(EventType::ServiceRequest),
            0x3FFF_200D => Some(EventType::Clear),
            0xBFFF_200E => Some(EventType::Exception),
            0x3FFF_2012 => Some(EventType::GpibCic),
            0x3FFF_2013 => Some(EventType::GpibTalk),
            0x3FFF_2014 => Some(EventType::GpibListen),
            0x3FFF_201D => Some(EventType::VxiVmeSysfail),
            0x3FFF_201E => Some(EventType::VxiVmeSysreset),
            0x3FFF_2020 => Some(EventType::VxiSignal),
            0xBFFF_2021 => Some(EventType::VxiVmeIntr),
            0x3FFF_2022 => Some(EventType::PxiIntr),
            0x3FFF_2036 => Some(EventType::TcpipConnect),
            0x3FFF_2037 => Some(EventType::UsbIntr),
            _ => None,
        }
    }
}

/// Timeout of a blocking operation, in milliseconds at the public surface.
///
/// `Immediate` and `Infinite` are the distinguished raw values 0 and
/// 0xFFFFFFFF of the timeout attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Immediate,
    Ms(u32),
    Infinite,
}

impl Timeout {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            TIMEOUT_IMMEDIATE => Timeout::Immediate,
            TIMEOUT_INFINITE => Timeout::Infinite,
            ms => Timeout::Ms(ms),
        }
    }

    pub fn as_raw(&self) -> u32 {
        match self {
            Timeout::Immediate => TIMEOUT_IMMEDIATE,
            Timeout::Infinite => TIMEOUT_INFINITE,
            Timeout::Ms(ms) => *ms,
        }
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Immediate => f.write_str("immediate"),
            Timeout::Infinite => f.write_str("infinite"),
            Timeout::Ms(ms) => write!(f, "{}ms", ms),
        }
    }
}

/// A raw VISA completion or error code.
///
/// Errors are negative, zero is plain success, positive values carry
/// completion or warning information.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

macro_rules! status_codes {
    ($($(#[$meta:meta])* $name:ident = $value:expr;)*) => {
        impl StatusCode {
            $($(#[$meta])* pub const $name: StatusCode = StatusCode($value as u32 as i32);)*

            /// Symbolic name if the code is part of the known set.
            pub fn name(&self) -> Option<&'static str> {
                match *self {
                    $(StatusCode::$name => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    SUCCESS = 0x0000_0000;
    SUCCESS_EVENT_EN = 0x3FFF_0002;
    SUCCESS_EVENT_DIS = 0x3FFF_0003;
    SUCCESS_QUEUE_EMPTY = 0x3FFF_0004;
    SUCCESS_TERM_CHAR = 0x3FFF_0005;
    /// The read filled the requested count without seeing END.
    SUCCESS_MAX_CNT = 0x3FFF_0006;
    SUCCESS_DEV_NPRESENT = 0x3FFF_007D;
    SUCCESS_TRIG_MAPPED = 0x3FFF_007E;
    SUCCESS_QUEUE_NEMPTY = 0x3FFF_0080;
    SUCCESS_NCHAIN = 0x3FFF_0098;
    SUCCESS_NESTED_SHARED = 0x3FFF_0099;
    SUCCESS_NESTED_EXCLUSIVE = 0x3FFF_009A;
    SUCCESS_SYNC = 0x3FFF_009B;

    WARN_QUEUE_OVERFLOW = 0x3FFF_000C;
    WARN_CONFIG_NLOADED = 0x3FFF_0077;
    WARN_NULL_OBJECT = 0x3FFF_0082;
    WARN_NSUP_ATTR_STATE = 0x3FFF_0084;
    WARN_UNKNOWN_STATUS = 0x3FFF_0085;
    WARN_NSUP_BUF = 0x3FFF_0088;
    WARN_EXT_FUNC_NIMPL = 0x3FFF_00A9;

    ERROR_SYSTEM_ERROR = 0xBFFF_0000;
    ERROR_INV_OBJECT = 0xBFFF_000E;
    ERROR_RSRC_LOCKED = 0xBFFF_000F;
    ERROR_INV_EXPR = 0xBFFF_0010;
    ERROR_RSRC_NFOUND = 0xBFFF_0011;
    ERROR_INV_RSRC_NAME = 0xBFFF_0012;
    ERROR_INV_ACC_MODE = 0xBFFF_0013;
    ERROR_TMO = 0xBFFF_0015;
    ERROR_CLOSING_FAILED = 0xBFFF_0016;
    ERROR_NSUP_ATTR = 0xBFFF_001D;
    ERROR_NSUP_ATTR_STATE = 0xBFFF_001E;
    ERROR_ATTR_READONLY = 0xBFFF_001F;
    ERROR_INV_LOCK_TYPE = 0xBFFF_0020;
    ERROR_INV_ACCESS_KEY = 0xBFFF_0021;
    ERROR_INV_EVENT = 0xBFFF_0026;
    ERROR_INV_MECH = 0xBFFF_0027;
    ERROR_HNDLR_NINSTALLED = 0xBFFF_0028;
    ERROR_INV_HNDLR_REF = 0xBFFF_0029;
    ERROR_INV_CONTEXT = 0xBFFF_002A;
    ERROR_QUEUE_OVERFLOW = 0xBFFF_002D;
    ERROR_NENABLED = 0xBFFF_002F;
    ERROR_ABORT = 0xBFFF_0030;
    ERROR_INV_SETUP = 0xBFFF_003A;
    ERROR_QUEUE_ERROR = 0xBFFF_003B;
    ERROR_ALLOC = 0xBFFF_003C;
    ERROR_INV_MASK = 0xBFFF_003D;
    ERROR_IO = 0xBFFF_003E;
    ERROR_SRQ_NOCCURRED = 0xBFFF_004A;
    ERROR_INV_SPACE = 0xBFFF_004E;
    ERROR_INV_OFFSET = 0xBFFF_0051;
    ERROR_INV_WIDTH = 0xBFFF_0052;
    ERROR_NSUP_OFFSET = 0xBFFF_0054;
    ERROR_WINDOW_NMAPPED = 0xBFFF_0057;
    ERROR_NLISTENERS = 0xBFFF_005F;
    ERROR_NCIC = 0xBFFF_0060;
    ERROR_NSUP_OPER = 0xBFFF_0067;
    ERROR_ASRL_PARITY = 0xBFFF_006A;
    ERROR_ASRL_FRAMING = 0xBFFF_006B;
    ERROR_ASRL_OVERRUN = 0xBFFF_006C;
    ERROR_RSRC_BUSY = 0xBFFF_0072;
    ERROR_INV_PARAMETER = 0xBFFF_0078;
    ERROR_INV_SIZE = 0xBFFF_007B;
    ERROR_WINDOW_MAPPED = 0xBFFF_0080;
    ERROR_NIMPL_OPER = 0xBFFF_0081;
    ERROR_INV_LENGTH = 0xBFFF_0083;
    ERROR_SESN_NLOCKED = 0xBFFF_009C;
    ERROR_LIBRARY_NFOUND = 0xBFFF_009E;
    ERROR_FILE_ACCESS = 0xBFFF_00A1;
    ERROR_FILE_IO = 0xBFFF_00A2;
    ERROR_NSUP_MECH = 0xBFFF_00A4;
    ERROR_INTF_NUM_NCONFIG = 0xBFFF_00A5;
    ERROR_CONN_LOST = 0xBFFF_00A6;
    ERROR_NPERMISSION = 0xBFFF_00A8;
}

impl StatusCode {
    pub fn is_error(&self) -> bool {
        self.0 < 0
    }

    pub fn is_warning(&self) -> bool {
        self.0 > 0
    }

    pub fn is_success(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "StatusCode({name})"),
            None => write!(f, "StatusCode({:#010X})", self.0 as u32),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#010X}", self.0 as u32),
        }
    }
}

/// Identifier of a session or event attribute.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrId(pub u32);

macro_rules! attr_ids {
    ($($(#[$meta:meta])* $name:ident = $value:expr;)*) => {
        impl AttrId {
            $($(#[$meta])* pub const $name: AttrId = AttrId($value);)*

            pub fn name(&self) -> Option<&'static str> {
                match *self {
                    $(AttrId::$name => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

attr_ids! {
    RSRC_CLASS = 0xBFFF_0001;
    RSRC_NAME = 0xBFFF_0002;
    RSRC_IMPL_VERSION = 0x3FFF_0003;
    RSRC_LOCK_STATE = 0x3FFF_0004;
    MAX_QUEUE_LENGTH = 0x3FFF_0005;
    SEND_END_EN = 0x3FFF_0016;
    TERMCHAR = 0x3FFF_0018;
    TMO_VALUE = 0x3FFF_001A;
    IO_PROT = 0x3FFF_001C;
    ASRL_BAUD = 0x3FFF_0021;
    ASRL_DATA_BITS = 0x3FFF_0022;
    ASRL_PARITY = 0x3FFF_0023;
    ASRL_STOP_BITS = 0x3FFF_0024;
    ASRL_FLOW_CNTRL = 0x3FFF_0025;
    SUPPRESS_END_EN = 0x3FFF_0036;
    TERMCHAR_EN = 0x3FFF_0038;
    DEST_BYTE_ORDER = 0x3FFF_003A;
    SRC_BYTE_ORDER = 0x3FFF_003D;
    SRC_INCREMENT = 0x3FFF_0040;
    DEST_INCREMENT = 0x3FFF_0041;
    WIN_ACCESS = 0x3FFF_00C3;
    WIN_BASE_ADDR = 0x3FFF_0098;
    WIN_SIZE = 0x3FFF_009A;
    ASRL_AVAIL_NUM = 0x3FFF_00AC;
    ASRL_CTS_STATE = 0x3FFF_00AE;
    ASRL_DCD_STATE = 0x3FFF_00AF;
    ASRL_DSR_STATE = 0x3FFF_00B1;
    ASRL_DTR_STATE = 0x3FFF_00B2;
    ASRL_END_IN = 0x3FFF_00B3;
    ASRL_END_OUT = 0x3FFF_00B4;
    ASRL_RI_STATE = 0x3FFF_00BF;
    ASRL_RTS_STATE = 0x3FFF_00C0;
    ASRL_XON_CHAR = 0x3FFF_00C1;
    ASRL_XOFF_CHAR = 0x3FFF_00C2;
    ASRL_BREAK_STATE = 0x3FFF_01BC;
    ASRL_BREAK_LEN = 0x3FFF_01BD;
    RM_SESSION = 0x3FFF_00C4;
    MANF_ID = 0x3FFF_00D9;
    MODEL_CODE = 0x3FFF_00DF;
    RSRC_SPEC_VERSION = 0x3FFF_0170;
    INTF_TYPE = 0x3FFF_0171;
    GPIB_PRIMARY_ADDR = 0x3FFF_0172;
    GPIB_SECONDARY_ADDR = 0x3FFF_0173;
    RSRC_MANF_NAME = 0xBFFF_0174;
    RSRC_MANF_ID = 0x3FFF_0175;
    INTF_NUM = 0x3FFF_0176;
    TRIG_ID = 0x3FFF_0177;
    GPIB_REN_STATE = 0x3FFF_0181;
    GPIB_ATN_STATE = 0x3FFF_0057;
    GPIB_SRQ_STATE = 0x3FFF_0067;
    GPIB_CIC_STATE = 0x3FFF_005E;
    GPIB_ADDR_STATE = 0x3FFF_005C;
    DEV_STATUS_BYTE = 0x3FFF_0189;
    TCPIP_ADDR = 0xBFFF_0195;
    TCPIP_HOSTNAME = 0xBFFF_0196;
    TCPIP_PORT = 0x3FFF_0197;
    TCPIP_DEVICE_NAME = 0xBFFF_0199;
    TCPIP_NODELAY = 0x3FFF_019A;
    TCPIP_KEEPALIVE = 0x3FFF_019B;
    USB_SERIAL_NUM = 0xBFFF_01A0;
    USB_INTFC_NUM = 0x3FFF_01A1;
    USB_PROTOCOL = 0x3FFF_01A7;
    USB_MAX_INTR_SIZE = 0x3FFF_01AF;
    /// Event attribute: type of the delivered event.
    EVENT_TYPE = 0x3FFF_4010;
    /// Event attribute: status of the completed operation.
    STATUS = 0x3FFF_4025;
    JOB_ID = 0x3FFF_4006;
    RET_COUNT = 0x3FFF_4026;
    BUFFER = 0x3FFF_4027;
    RECV_TRIG_ID = 0x3FFF_4012;
    SIGP_STATUS_ID = 0x3FFF_4011;
    OPER_NAME = 0xBFFF_4042;
}

impl fmt::Debug for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "AttrId({name})"),
            None => write!(f, "AttrId({:#010X})", self.0),
        }
    }
}

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#010X}", self.0),
        }
    }
}
