//! Backend abstraction: the narrow capability surface the core calls.
//!
//! The default implementation marshals to a foreign VISA shared library
//! ([`library::VisaLibrary`]); alternative pure-software transports
//! implement [`VisaBackend`] as clients of this module.
//!
//! Every call reports a [`StatusCode`]. Error-class codes surface as
//! [`Error`] variants; warning-class codes ride along with the result so
//! the resource layer can record and log them.

pub mod ffi;
pub mod library;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use crate::constants::{
    AccessMode, AtnMode, AttrId, EventMechanism, EventType, FlushMask, LockKind, RenMode,
    StatusCode,
};
use crate::error::{Error, Result};

pub use registry::{register_backend, resolve_backend, split_backend_hint, DEFAULT_BACKEND};

/// Opaque per-resource capability token handed out by a backend.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Session(pub u32);

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({:#010X})", self.0)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

/// Opaque event context handle, valid until closed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventContext(pub u32);

/// Opaque handle identifying one installed handler toward the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendHandle(pub u64);

/// A typed attribute value crossing the backend boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I16(i16),
    Str(String),
}

impl AttrValue {
    /// Numeric view of the value, for range checks and FFI marshaling.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttrValue::Bool(b) => Some(*b as u64),
            AttrValue::U8(v) => Some(*v as u64),
            AttrValue::U16(v) => Some(*v as u64),
            AttrValue::U32(v) => Some(*v as u64),
            AttrValue::U64(v) => Some(*v),
            AttrValue::I16(v) => Some(*v as u16 as u64),
            AttrValue::Str(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_u16(&self) -> Option<u16> {
        self.as_u64().and_then(|v| u16::try_from(v).ok())
    }

    pub fn as_u8(&self) -> Option<u8> {
        self.as_u64().and_then(|v| u8::try_from(v).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            other => other.as_u64().map(|v| v != 0),
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            AttrValue::I16(v) => Some(*v),
            other => other.as_u64().and_then(|v| i16::try_from(v).ok()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Outcome of `wait_on_event`. A timeout is data, not an error.
#[derive(Debug, Clone, Copy)]
pub struct WaitEvent {
    pub event_type: EventType,
    pub context: Option<EventContext>,
    pub timed_out: bool,
    pub status: StatusCode,
}

/// Callback installed into a backend for handler-mechanism dispatch.
///
/// Invoked on whichever thread the backend dispatches callbacks on; the
/// core wraps user callbacks so panics never reach this boundary.
pub type HandlerHook = Arc<dyn Fn(Session, EventType, Option<EventContext>) + Send + Sync>;

fn unsupported<T>(op: &'static str) -> Result<T> {
    Err(Error::UnsupportedOperation { op, kind: "backend" })
}

/// The minimum capability surface the core needs from a transport.
///
/// Bus-specific helpers default to `UnsupportedOperation` so a backend
/// only implements what its buses can do.
pub trait VisaBackend: Send + Sync {
    /// Short identifier, e.g. `ivi` for the shared-library binding.
    fn name(&self) -> &str;

    // --- session lifecycle ----------------------------------------------

    fn open_default_rm(&self) -> Result<(Session, StatusCode)>;

    fn open(
        &self,
        rm: Session,
        resource_name: &str,
        access_mode: AccessMode,
        open_timeout_ms: u32,
    ) -> Result<(Session, StatusCode)>;

    fn close(&self, session: Session) -> Result<StatusCode>;

    // --- discovery ------------------------------------------------------

    fn list_resources(&self, rm: Session, pattern: &str) -> Result<Vec<String>>;

    // --- attributes -----------------------------------------------------

    fn get_attribute(&self, session: Session, attr: AttrId) -> Result<(AttrValue, StatusCode)>;

    fn set_attribute(&self, session: Session, attr: AttrId, value: AttrValue)
        -> Result<StatusCode>;

    // --- locking --------------------------------------------------------

    /// Acquire a cooperative lock; for shared locks the granted key is
    /// returned (the requested key when the backend honors it).
    fn lock(
        &self,
        session: Session,
        kind: LockKind,
        timeout_ms: u32,
        requested_key: Option<&str>,
    ) -> Result<(Option<String>, StatusCode)>;

    fn unlock(&self, session: Session) -> Result<StatusCode>;

    // --- basic I/O ------------------------------------------------------

    fn read(&self, session: Session, count: usize) -> Result<(Vec<u8>, StatusCode)>;

    fn write(&self, session: Session, data: &[u8]) -> Result<(usize, StatusCode)>;

    // --- events ---------------------------------------------------------

    fn enable_event(
        &self,
        session: Session,
        event: EventType,
        mechanism: EventMechanism,
    ) -> Result<StatusCode>;

    fn disable_event(
        &self,
        session: Session,
        event: EventType,
        mechanism: EventMechanism,
    ) -> Result<StatusCode>;

    fn discard_events(
        &self,
        session: Session,
        event: EventType,
        mechanism: EventMechanism,
    ) -> Result<StatusCode>;

    fn wait_on_event(
        &self,
        session: Session,
        event: EventType,
        timeout_ms: u32,
    ) -> Result<WaitEvent>;

    fn install_handler(
        &self,
        session: Session,
        event: EventType,
        hook: HandlerHook,
    ) -> Result<(BackendHandle, StatusCode)>;

    fn uninstall_handler(
        &self,
        session: Session,
        event: EventType,
        handle: BackendHandle,
    ) -> Result<StatusCode>;

    /// Read an attribute of a delivered event context.
    fn get_event_attribute(
        &self,
        context: EventContext,
        attr: AttrId,
    ) -> Result<(AttrValue, StatusCode)>;

    /// Release a delivered event context.
    fn close_event(&self, context: EventContext) -> Result<StatusCode>;

    // --- bus-specific helpers -------------------------------------------

    fn assert_trigger(&self, _session: Session, _protocol: u16) -> Result<StatusCode> {
        unsupported("assert_trigger")
    }

    fn clear(&self, _session: Session) -> Result<StatusCode> {
        unsupported("clear")
    }

    fn read_stb(&self, _session: Session) -> Result<(u8, StatusCode)> {
        unsupported("read_stb")
    }

    fn flush(&self, _session: Session, _mask: FlushMask) -> Result<StatusCode> {
        unsupported("flush")
    }

    fn gpib_command(&self, _session: Session, _data: &[u8]) -> Result<(usize, StatusCode)> {
        unsupported("gpib_command")
    }

    fn gpib_control_ren(&self, _session: Session, _mode: RenMode) -> Result<StatusCode> {
        unsupported("gpib_control_ren")
    }

    fn gpib_control_atn(&self, _session: Session, _mode: AtnMode) -> Result<StatusCode> {
        unsupported("gpib_control_atn")
    }

    fn gpib_send_ifc(&self, _session: Session) -> Result<StatusCode> {
        unsupported("gpib_send_ifc")
    }

    fn gpib_pass_control(
        &self,
        _session: Session,
        _primary: u16,
        _secondary: u16,
    ) -> Result<StatusCode> {
        unsupported("gpib_pass_control")
    }

    fn usb_control_in(
        &self,
        _session: Session,
        _request_type: i16,
        _request: i16,
        _value: u16,
        _index: u16,
        _length: u16,
    ) -> Result<(Vec<u8>, StatusCode)> {
        unsupported("usb_control_in")
    }

    fn usb_control_out(
        &self,
        _session: Session,
        _request_type: i16,
        _request: i16,
        _value: u16,
        _index: u16,
        _data: &[u8],
    ) -> Result<StatusCode> {
        unsupported("usb_control_out")
    }

    // Register access. Addresses and sizes are 64-bit on this contract
    // regardless of host word size.

    fn peek8(&self, _session: Session, _space: u16, _offset: u64) -> Result<(u8, StatusCode)> {
        unsupported("peek8")
    }

    fn peek16(&self, _session: Session, _space: u16, _offset: u64) -> Result<(u16, StatusCode)> {
        unsupported("peek16")
    }

    fn peek32(&self, _session: Session, _space: u16, _offset: u64) -> Result<(u32, StatusCode)> {
        unsupported("peek32")
    }

    fn peek64(&self, _session: Session, _space: u16, _offset: u64) -> Result<(u64, StatusCode)> {
        unsupported("peek64")
    }

    fn poke8(
        &self,
        _session: Session,
        _space: u16,
        _offset: u64,
        _value: u8,
    ) -> Result<StatusCode> {
        unsupported("poke8")
    }

    fn poke16(
        &self,
        _session: Session,
        _space: u16,
        _offset: u64,
        _value: u16,
    ) -> Result<StatusCode> {
        unsupported("poke16")
    }

    fn poke32(
        &self,
        _session: Session,
        _space: u16,
        _offset: u64,
        _value: u32,
    ) -> Result<StatusCode> {
        unsupported("poke32")
    }

    fn poke64(
        &self,
        _session: Session,
        _space: u16,
        _offset: u64,
        _value: u64,
    ) -> Result<StatusCode> {
        unsupported("poke64")
    }

    /// Block move from device memory into a byte buffer, 8-bit elements.
    fn move_in(
        &self,
        _session: Session,
        _space: u16,
        _offset: u64,
        _length: u64,
    ) -> Result<(Vec<u8>, StatusCode)> {
        unsupported("move_in")
    }

    fn move_out(
        &self,
        _session: Session,
        _space: u16,
        _offset: u64,
        _data: &[u8],
    ) -> Result<StatusCode> {
        unsupported("move_out")
    }

    /// Map a window of device memory; returns the mapped base address.
    fn map_address(
        &self,
        _session: Session,
        _space: u16,
        _base: u64,
        _size: u64,
    ) -> Result<(u64, StatusCode)> {
        unsupported("map_address")
    }

    fn unmap_address(&self, _session: Session) -> Result<StatusCode> {
        unsupported("unmap_address")
    }
}

impl std::fmt::Debug for dyn VisaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn VisaBackend").field("name", &self.name()).finish()
    }
}

/// Shared handle to a backend.
pub type BackendArc = Arc<dyn VisaBackend>;
