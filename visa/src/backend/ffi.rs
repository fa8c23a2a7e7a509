//! C ABI of the foreign VISA library.
//!
//! Type aliases mirror the VISA `Vi*` typedefs. Bus addresses and sizes
//! are 64-bit on this contract regardless of host word size; a 32-bit
//! implementation truncates at its own boundary, never in the core.

#![allow(clippy::upper_case_acronyms)]

use std::os::raw::{c_char, c_void};

use crate::error::{Error, Result};

pub type ViStatus = i32;
pub type ViSession = u32;
pub type ViObject = u32;
pub type ViFindList = u32;
pub type ViAttr = u32;
pub type ViAttrState = u64;
pub type ViEventType = u32;
pub type ViEvent = u32;
pub type ViEventFilter = u32;
pub type ViAccessMode = u32;
pub type ViUInt8 = u8;
pub type ViInt16 = i16;
pub type ViUInt16 = u16;
pub type ViUInt32 = u32;
pub type ViUInt64 = u64;
pub type ViBoolean = u16;
pub type ViBusAddress = u64;
pub type ViBusSize = u64;
pub type ViAddr = *mut c_void;
pub type ViString = *const c_char;
pub type ViRsrc = *const c_char;
pub type ViBuf = *const u8;
pub type ViPBuf = *mut u8;

/// Event-handler callback signature of the VISA ABI.
pub type ViHndlr =
    unsafe extern "C" fn(ViSession, ViEventType, ViEvent, ViAddr) -> ViStatus;

/// Size of the description buffers used by find and status calls.
pub const FIND_BUFLEN: usize = 256;

macro_rules! symbol_table {
    ($($field:ident: $cname:literal => $ty:ty;)*) => {
        /// The `vi*` entry points resolved once at load time.
        ///
        /// Plain function pointers; the owning [`super::library::VisaLibrary`]
        /// keeps the shared library mapped for as long as they are callable.
        #[derive(Clone, Copy)]
        pub struct SymbolTable {
            $(pub $field: $ty,)*
        }

        impl SymbolTable {
            /// Resolve every required symbol, failing with the missing
            /// symbol's name if the library is not a complete VISA
            /// implementation.
            ///
            /// # Safety
            /// The library must export these symbols with the VISA ABI.
            pub unsafe fn resolve(
                lib: &libloading::Library,
                path: &str,
            ) -> Result<SymbolTable> {
                Ok(SymbolTable {
                    $($field: *lib
                        .get::<$ty>(concat!($cname, "\0").as_bytes())
                        .map_err(|e| Error::Library {
                            path: path.to_string(),
                            reason: format!("missing symbol {}: {e}", $cname),
                        })?,)*
                })
            }
        }
    };
}

symbol_table! {
    open_default_rm: "viOpenDefaultRM" => unsafe extern "C" fn(*mut ViSession) -> ViStatus;
    open: "viOpen" => unsafe extern "C" fn(ViSession, ViRsrc, ViAccessMode, ViUInt32, *mut ViSession) -> ViStatus;
    close: "viClose" => unsafe extern "C" fn(ViObject) -> ViStatus;
    find_rsrc: "viFindRsrc" => unsafe extern "C" fn(ViSession, ViString, *mut ViFindList, *mut ViUInt32, *mut c_char) -> ViStatus;
    find_next: "viFindNext" => unsafe extern "C" fn(ViFindList, *mut c_char) -> ViStatus;
    read: "viRead" => unsafe extern "C" fn(ViSession, ViPBuf, ViUInt32, *mut ViUInt32) -> ViStatus;
    write: "viWrite" => unsafe extern "C" fn(ViSession, ViBuf, ViUInt32, *mut ViUInt32) -> ViStatus;
    get_attribute: "viGetAttribute" => unsafe extern "C" fn(ViObject, ViAttr, *mut c_void) -> ViStatus;
    set_attribute: "viSetAttribute" => unsafe extern "C" fn(ViObject, ViAttr, ViAttrState) -> ViStatus;
    status_desc: "viStatusDesc" => unsafe extern "C" fn(ViObject, ViStatus, *mut c_char) -> ViStatus;
    lock: "viLock" => unsafe extern "C" fn(ViSession, ViAccessMode, ViUInt32, ViString, *mut c_char) -> ViStatus;
    unlock: "viUnlock" => unsafe extern "C" fn(ViSession) -> ViStatus;
    enable_event: "viEnableEvent" => unsafe extern "C" fn(ViSession, ViEventType, ViUInt16, ViEventFilter) -> ViStatus;
    disable_event: "viDisableEvent" => unsafe extern "C" fn(ViSession, ViEventType, ViUInt16) -> ViStatus;
    discard_events: "viDiscardEvents" => unsafe extern "C" fn(ViSession, ViEventType, ViUInt16) -> ViStatus;
    wait_on_event: "viWaitOnEvent" => unsafe extern "C" fn(ViSession, ViEventType, ViUInt32, *mut ViEventType, *mut ViEvent) -> ViStatus;
    install_handler: "viInstallHandler" => unsafe extern "C" fn(ViSession, ViEventType, ViHndlr, ViAddr) -> ViStatus;
    uninstall_handler: "viUninstallHandler" => unsafe extern "C" fn(ViSession, ViEventType, ViHndlr, ViAddr) -> ViStatus;
    assert_trigger: "viAssertTrigger" => unsafe extern "C" fn(ViSession, ViUInt16) -> ViStatus;
    clear: "viClear" => unsafe extern "C" fn(ViSession) -> ViStatus;
    read_stb: "viReadSTB" => unsafe extern "C" fn(ViSession, *mut ViUInt16) -> ViStatus;
    gpib_command: "viGpibCommand" => unsafe extern "C" fn(ViSession, ViBuf, ViUInt32, *mut ViUInt32) -> ViStatus;
    gpib_control_ren: "viGpibControlREN" => unsafe extern "C" fn(ViSession, ViUInt16) -> ViStatus;
    gpib_control_atn: "viGpibControlATN" => unsafe extern "C" fn(ViSession, ViUInt16) -> ViStatus;
    gpib_send_ifc: "viGpibSendIFC" => unsafe extern "C" fn(ViSession) -> ViStatus;
    gpib_pass_control: "viGpibPassControl" => unsafe extern "C" fn(ViSession, ViUInt16, ViUInt16) -> ViStatus;
    flush: "viFlush" => unsafe extern "C" fn(ViSession, ViUInt16) -> ViStatus;
    usb_control_in: "viUsbControlIn" => unsafe extern "C" fn(ViSession, ViInt16, ViInt16, ViUInt16, ViUInt16, ViUInt16, ViPBuf, *mut ViUInt16) -> ViStatus;
    usb_control_out: "viUsbControlOut" => unsafe extern "C" fn(ViSession, ViInt16, ViInt16, ViUInt16, ViUInt16, ViUInt16, ViBuf) -> ViStatus;
    in8: "viIn8" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, *mut ViUInt8) -> ViStatus;
    in16: "viIn16" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, *mut ViUInt16) -> ViStatus;
    in32: "viIn32" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, *mut ViUInt32) -> ViStatus;
    in64: "viIn64" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, *mut ViUInt64) -> ViStatus;
    out8: "viOut8" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, ViUInt8) -> ViStatus;
    out16: "viOut16" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, ViUInt16) -> ViStatus;
    out32: "viOut32" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, ViUInt32) -> ViStatus;
    out64: "viOut64" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, ViUInt64) -> ViStatus;
    move_in8: "viMoveIn8" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, ViBusSize, *mut ViUInt8) -> ViStatus;
    move_out8: "viMoveOut8" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, ViBusSize, ViBuf) -> ViStatus;
    map_address: "viMapAddress" => unsafe extern "C" fn(ViSession, ViUInt16, ViBusAddress, ViBusSize, ViBoolean, ViAddr, *mut ViAddr) -> ViStatus;
    unmap_address: "viUnmapAddress" => unsafe extern "C" fn(ViSession) -> ViStatus;
}

/// Copy a NUL-terminated C buffer into an owned string.
pub fn from_c_buffer(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
