//! Register-based capability (PXI/VXI memory access) and the VXI
//! backplane/memory resources.

use crate::constants::{AddressSpace, DataWidth, TRIG_PROT_DEFAULT};
use crate::error::Result;
use crate::resources::messagebased::MessageBased;
use crate::resources::resource::{Resource, ResourceCore};
use crate::resources::resource_type;

/// Typed register and memory access for PXI/VXI sessions.
pub trait RegisterBased: Resource {
    /// Read one register of the given width; narrower reads zero-extend.
    fn read_memory(&self, space: AddressSpace, offset: u64, width: DataWidth) -> Result<u64> {
        let space = space.value();
        match width {
            DataWidth::W8 => self
                .core()
                .with_session("peek8", |b, s| b.peek8(s, space, offset))
                .map(u64::from),
            DataWidth::W16 => self
                .core()
                .with_session("peek16", |b, s| b.peek16(s, space, offset))
                .map(u64::from),
            DataWidth::W32 => self
                .core()
                .with_session("peek32", |b, s| b.peek32(s, space, offset))
                .map(u64::from),
            DataWidth::W64 => self
                .core()
                .with_session("peek64", |b, s| b.peek64(s, space, offset)),
        }
    }

    /// Write one register of the given width; the value is truncated to
    /// the access width.
    fn write_memory(
        &self,
        space: AddressSpace,
        offset: u64,
        width: DataWidth,
        value: u64,
    ) -> Result<()> {
        let space = space.value();
        match width {
            DataWidth::W8 => self
                .core()
                .run("poke8", |b, s| b.poke8(s, space, offset, value as u8)),
            DataWidth::W16 => self
                .core()
                .run("poke16", |b, s| b.poke16(s, space, offset, value as u16)),
            DataWidth::W32 => self
                .core()
                .run("poke32", |b, s| b.poke32(s, space, offset, value as u32)),
            DataWidth::W64 => self
                .core()
                .run("poke64", |b, s| b.poke64(s, space, offset, value)),
        }
    }

    fn read_u8(&self, space: AddressSpace, offset: u64) -> Result<u8> {
        self.read_memory(space, offset, DataWidth::W8).map(|v| v as u8)
    }

    fn read_u16(&self, space: AddressSpace, offset: u64) -> Result<u16> {
        self.read_memory(space, offset, DataWidth::W16).map(|v| v as u16)
    }

    fn read_u32(&self, space: AddressSpace, offset: u64) -> Result<u32> {
        self.read_memory(space, offset, DataWidth::W32).map(|v| v as u32)
    }

    fn read_u64(&self, space: AddressSpace, offset: u64) -> Result<u64> {
        self.read_memory(space, offset, DataWidth::W64)
    }

    fn write_u8(&self, space: AddressSpace, offset: u64, value: u8) -> Result<()> {
        self.write_memory(space, offset, DataWidth::W8, value as u64)
    }

    fn write_u16(&self, space: AddressSpace, offset: u64, value: u16) -> Result<()> {
        self.write_memory(space, offset, DataWidth::W16, value as u64)
    }

    fn write_u32(&self, space: AddressSpace, offset: u64, value: u32) -> Result<()> {
        self.write_memory(space, offset, DataWidth::W32, value as u64)
    }

    fn write_u64(&self, space: AddressSpace, offset: u64, value: u64) -> Result<()> {
        self.write_memory(space, offset, DataWidth::W64, value)
    }

    /// Block transfer from device memory.
    fn move_in(&self, space: AddressSpace, offset: u64, length: u64) -> Result<Vec<u8>> {
        let space = space.value();
        self.core()
            .with_session("move_in", |b, s| b.move_in(s, space, offset, length))
    }

    /// Block transfer into device memory.
    fn move_out(&self, space: AddressSpace, offset: u64, data: &[u8]) -> Result<()> {
        let space = space.value();
        self.core()
            .run("move_out", |b, s| b.move_out(s, space, offset, data))
    }

    /// Map a window of device memory; the window unmaps when the guard
    /// drops.
    fn map_address(
        &self,
        space: AddressSpace,
        base: u64,
        size: u64,
    ) -> Result<MappedWindow<'_>> {
        let raw_space = space.value();
        let mapped = self.core().with_session("map_address", |b, s| {
            b.map_address(s, raw_space, base, size)
        })?;
        Ok(MappedWindow {
            core: self.core(),
            base: mapped,
            size,
        })
    }
}

/// A mapped window of device memory; unmapped on drop.
#[must_use = "the window is unmapped when the guard is dropped"]
pub struct MappedWindow<'a> {
    core: &'a ResourceCore,
    base: u64,
    size: u64,
}

impl MappedWindow<'_> {
    /// Mapped base address in the backend's address space.
    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for MappedWindow<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.core.run("unmap_address", |b, s| b.unmap_address(s)) {
            log::debug!("{}: unmap on scope exit: {err}", self.core.canonical_name());
        }
    }
}

resource_type! {
    /// PXI memory-access session (`PXI[iface]::MEMACC`).
    RegisterResource, "RegisterResource"
}

impl RegisterBased for RegisterResource {}

resource_type! {
    /// A PXI device function (`PXI[bus]::device[::function]::INSTR`).
    PxiInstrument, "PXIInstrument"
}

impl MessageBased for PxiInstrument {}
impl RegisterBased for PxiInstrument {}

resource_type! {
    /// A VXI message-based device (`VXI[board]::logical::INSTR`).
    VxiInstrument, "VXIInstrument"
}

impl MessageBased for VxiInstrument {}
impl RegisterBased for VxiInstrument {}

impl VxiInstrument {
    /// Fire the default trigger toward the device.
    pub fn assert_trigger(&self) -> Result<()> {
        self.core().run("assert_trigger", |backend, session| {
            backend.assert_trigger(session, TRIG_PROT_DEFAULT)
        })
    }
}

resource_type! {
    /// The VXI mainframe backplane (`VXI[board][::logical]::BACKPLANE`).
    VxiBackplane, "VXIBackplane"
}

impl RegisterBased for VxiBackplane {}

impl VxiBackplane {
    /// Assert a backplane trigger line.
    pub fn assert_trigger(&self) -> Result<()> {
        self.core().run("assert_trigger", |backend, session| {
            backend.assert_trigger(session, TRIG_PROT_DEFAULT)
        })
    }
}

resource_type! {
    /// VXI memory-access session (`VXI[board]::MEMACC`).
    VxiMemory, "VXIMemory"
}

impl RegisterBased for VxiMemory {}
