//! Uniform frontend for controlling laboratory test equipment over
//! heterogeneous buses (GPIB, serial, USB-TMC, Ethernet, PXI, VXI)
//! through one object model.
//!
//! The crate wraps a VISA implementation behind the narrow
//! [`backend::VisaBackend`] capability trait. The default backend loads a
//! vendor VISA shared library at runtime and is selected by a trailing
//! `@ivi` on the library hint; alternative transports register under
//! their own names.
//!
//! ```no_run
//! use visa::{MessageBasedExt, OpenOptions, ResourceManager};
//! use visa::resources::MessageBased;
//!
//! let rm = ResourceManager::from_hint("/usr/lib/libvisa.so@ivi")?;
//! for name in rm.list_resources_default()? {
//!     println!("{name}");
//! }
//!
//! let scope = rm
//!     .open_resource("TCPIP::192.168.0.42::INSTR", OpenOptions::default())?
//!     .into_tcpip_instrument()
//!     .ok()
//!     .expect("name guarantees a TCPIP instrument");
//! scope.set_read_termination("\n")?;
//! let idn = scope.query("*IDN?")?;
//! let trace: Vec<f64> = scope.query_binary_values("CURV?", Default::default())?;
//! # let _ = (idn, trace);
//! # Ok::<(), visa::Error>(())
//! ```
//!
//! Resources are blocking and thread-parallel: each resource serializes
//! its own backend calls, different resources proceed independently.
//! Sessions close on drop; scoped constructs ([`LockGuard`],
//! [`resources::MappedWindow`]) release on every exit path.

pub mod attributes;
pub mod backend;
pub mod codec;
pub mod constants;
pub mod error;
pub mod event;
pub mod resources;
pub mod rm;
pub mod rname;

pub use backend::{AttrValue, Session, VisaBackend};
pub use constants::{
    AccessMode, AttrId, EventMechanism, EventType, InterfaceType, LockKind, ResourceClass,
    StatusCode, Timeout,
};
pub use error::{Error, Result};
pub use event::{Event, HandlerId, WaitResponse};
pub use resources::{
    AnyResource, BinaryOptions, BlockFormat, Encoding, GpibInstrument, GpibInterface, LockGuard,
    MessageBased, MessageBasedExt, ReadBytesOptions, RegisterBased, Resource, SerialInstrument,
    TcpipInstrument, TcpipSocket, UsbInstrument, UsbRaw,
};
pub use rm::{OpenOptions, ResourceInfo, ResourceManager};
pub use rname::{Board, ResourceKind, ResourceName};
