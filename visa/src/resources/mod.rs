//! The resource hierarchy: a shared core, capability traits and one
//! concrete type per (interface, resource class) pair.
//!
//! `open_resource` dispatch is a match over the parsed name tag; pairs
//! without a specialized type fall back to [`GenericResource`] with a
//! warning.

pub mod gpib;
pub mod messagebased;
pub mod registerbased;
pub mod resource;
pub mod serial;
pub mod tcpip;
pub mod usb;

use std::sync::Arc;

use crate::constants::{InterfaceType, ResourceClass};
use crate::rname::ResourceKind;

pub use gpib::{GpibInstrument, GpibInterface};
pub use messagebased::{
    BinaryOptions, BlockFormat, Encoding, IoConfig, MessageBased, MessageBasedExt,
    ReadBytesOptions, DEFAULT_CHUNK_SIZE,
};
pub use registerbased::{
    MappedWindow, PxiInstrument, RegisterBased, RegisterResource, VxiBackplane, VxiInstrument,
    VxiMemory,
};
pub use resource::{LockGuard, Resource, ResourceCore, WarningGuard};
pub use serial::SerialInstrument;
pub use tcpip::{TcpipInstrument, TcpipSocket, VicpInstrument};
pub use usb::{UsbInstrument, UsbRaw};

macro_rules! resource_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        pub struct $name {
            core: std::sync::Arc<$crate::resources::resource::ResourceCore>,
        }

        impl $name {
            pub(crate) fn from_core(
                core: std::sync::Arc<$crate::resources::resource::ResourceCore>,
            ) -> Self {
                Self { core }
            }
        }

        impl $crate::resources::resource::Resource for $name {
            fn core(&self) -> &$crate::resources::resource::ResourceCore {
                &self.core
            }

            fn kind_name(&self) -> &'static str {
                $kind
            }
        }
    };
}
pub(crate) use resource_type;

resource_type! {
    /// Fallback for (interface, class) pairs without a specialized type;
    /// exposes the base resource surface only.
    GenericResource, "GenericResource"
}

/// A resource opened by the resource manager, tagged by its concrete type.
#[non_exhaustive]
pub enum AnyResource {
    GpibInstrument(GpibInstrument),
    GpibInterface(GpibInterface),
    Serial(SerialInstrument),
    TcpipInstrument(TcpipInstrument),
    TcpipSocket(TcpipSocket),
    Vicp(VicpInstrument),
    UsbInstrument(UsbInstrument),
    UsbRaw(UsbRaw),
    PxiInstrument(PxiInstrument),
    VxiInstrument(VxiInstrument),
    VxiBackplane(VxiBackplane),
    VxiMemory(VxiMemory),
    Register(RegisterResource),
    Generic(GenericResource),
}

macro_rules! for_each_variant {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            AnyResource::GpibInstrument($r) => $body,
            AnyResource::GpibInterface($r) => $body,
            AnyResource::Serial($r) => $body,
            AnyResource::TcpipInstrument($r) => $body,
            AnyResource::TcpipSocket($r) => $body,
            AnyResource::Vicp($r) => $body,
            AnyResource::UsbInstrument($r) => $body,
            AnyResource::UsbRaw($r) => $body,
            AnyResource::PxiInstrument($r) => $body,
            AnyResource::VxiInstrument($r) => $body,
            AnyResource::VxiBackplane($r) => $body,
            AnyResource::VxiMemory($r) => $body,
            AnyResource::Register($r) => $body,
            AnyResource::Generic($r) => $body,
        }
    };
}

impl Resource for AnyResource {
    fn core(&self) -> &ResourceCore {
        for_each_variant!(self, r => r.core())
    }

    fn kind_name(&self) -> &'static str {
        for_each_variant!(self, r => r.kind_name())
    }
}

impl std::fmt::Debug for AnyResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyResource")
            .field("kind", &self.kind_name())
            .finish()
    }
}

macro_rules! narrow {
    ($(#[$meta:meta])* $fn_name:ident, $variant:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(self) -> Result<$ty, AnyResource> {
            match self {
                AnyResource::$variant(resource) => Ok(resource),
                other => Err(other),
            }
        }
    };
}

impl AnyResource {
    /// View as a message-based resource, if this kind supports message
    /// I/O. Value-transfer methods come with [`MessageBasedExt`].
    pub fn as_message_based(&self) -> Option<&dyn MessageBased> {
        match self {
            AnyResource::GpibInstrument(r) => Some(r),
            AnyResource::GpibInterface(r) => Some(r),
            AnyResource::Serial(r) => Some(r),
            AnyResource::TcpipInstrument(r) => Some(r),
            AnyResource::TcpipSocket(r) => Some(r),
            AnyResource::Vicp(r) => Some(r),
            AnyResource::UsbInstrument(r) => Some(r),
            AnyResource::UsbRaw(r) => Some(r),
            AnyResource::PxiInstrument(r) => Some(r),
            AnyResource::VxiInstrument(r) => Some(r),
            _ => None,
        }
    }

    /// View as a register-based resource, if this kind supports memory
    /// access.
    pub fn as_register_based(&self) -> Option<&dyn RegisterBased> {
        match self {
            AnyResource::PxiInstrument(r) => Some(r),
            AnyResource::VxiInstrument(r) => Some(r),
            AnyResource::VxiBackplane(r) => Some(r),
            AnyResource::VxiMemory(r) => Some(r),
            AnyResource::Register(r) => Some(r),
            _ => None,
        }
    }

    narrow! {
        /// Narrow to a GPIB instrument, returning self on mismatch.
        into_gpib_instrument, GpibInstrument, GpibInstrument
    }
    narrow!(into_gpib_interface, GpibInterface, GpibInterface);
    narrow!(into_serial, Serial, SerialInstrument);
    narrow!(into_tcpip_instrument, TcpipInstrument, TcpipInstrument);
    narrow!(into_tcpip_socket, TcpipSocket, TcpipSocket);
    narrow!(into_vicp, Vicp, VicpInstrument);
    narrow!(into_usb_instrument, UsbInstrument, UsbInstrument);
    narrow!(into_usb_raw, UsbRaw, UsbRaw);
    narrow!(into_pxi_instrument, PxiInstrument, PxiInstrument);
    narrow!(into_vxi_instrument, VxiInstrument, VxiInstrument);
    narrow!(into_register, Register, RegisterResource);
}

/// Wrap an open core in the concrete type for its (interface, class)
/// pair. Remote names dispatch on the proxied inner resource.
pub(crate) fn dispatch(
    core: Arc<ResourceCore>,
    class_override: Option<ResourceClass>,
) -> AnyResource {
    let parsed = core.parsed_name();
    let effective_name = match &parsed.kind {
        ResourceKind::Remote { inner, .. } => inner.as_ref().clone(),
        _ => parsed.clone(),
    };
    let interface = effective_name.interface_type();
    let class = class_override.unwrap_or_else(|| effective_name.resource_class());

    // Serial lines conventionally terminate messages with CR.
    if interface == InterfaceType::Asrl {
        let mut cfg = core.io_cfg.lock();
        cfg.read_termination = "\r".to_string();
        cfg.write_termination = "\r".to_string();
    }

    match (interface, class) {
        (InterfaceType::Gpib, ResourceClass::Instr) => {
            AnyResource::GpibInstrument(GpibInstrument::from_core(core))
        }
        (InterfaceType::Gpib, ResourceClass::Intfc) => {
            AnyResource::GpibInterface(GpibInterface::from_core(core))
        }
        (InterfaceType::Asrl, ResourceClass::Instr) => {
            AnyResource::Serial(SerialInstrument::from_core(core))
        }
        (InterfaceType::Tcpip, ResourceClass::Instr) => {
            AnyResource::TcpipInstrument(TcpipInstrument::from_core(core))
        }
        (InterfaceType::Tcpip, ResourceClass::Socket) => {
            AnyResource::TcpipSocket(TcpipSocket::from_core(core))
        }
        (InterfaceType::Vicp, ResourceClass::Instr) => {
            AnyResource::Vicp(VicpInstrument::from_core(core))
        }
        (InterfaceType::Usb, ResourceClass::Instr) => {
            AnyResource::UsbInstrument(UsbInstrument::from_core(core))
        }
        (InterfaceType::Usb, ResourceClass::Raw) => AnyResource::UsbRaw(UsbRaw::from_core(core)),
        (InterfaceType::Pxi, ResourceClass::Instr) => {
            AnyResource::PxiInstrument(PxiInstrument::from_core(core))
        }
        (InterfaceType::Pxi, ResourceClass::Memacc) => {
            AnyResource::Register(RegisterResource::from_core(core))
        }
        (InterfaceType::Vxi, ResourceClass::Instr) => {
            AnyResource::VxiInstrument(VxiInstrument::from_core(core))
        }
        (InterfaceType::Vxi, ResourceClass::Backplane) => {
            AnyResource::VxiBackplane(VxiBackplane::from_core(core))
        }
        (InterfaceType::Vxi, ResourceClass::Memacc) => {
            AnyResource::VxiMemory(VxiMemory::from_core(core))
        }
        (interface, class) => {
            log::warn!(
                "{}: no specialized resource type for ({interface}, {class}); \
                 using the generic resource",
                core.canonical_name()
            );
            AnyResource::Generic(GenericResource::from_core(core))
        }
    }
}
