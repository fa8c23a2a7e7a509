//! Default backend: a foreign VISA shared library loaded at runtime.
//!
//! One [`VisaLibrary`] exists per canonical library path; ResourceManagers
//! pointing at the same path share it through a process-wide weak cache.
//! Every entry point captures the returned status; error-class statuses
//! map to [`Error`] variants at this boundary.

use std::collections::HashMap;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::attributes::{self, AttrKind};
use crate::backend::ffi::{self, SymbolTable, ViAddr, ViEvent, ViEventType, ViSession, ViStatus};
use crate::backend::{
    AttrValue, BackendHandle, EventContext, HandlerHook, Session, VisaBackend, WaitEvent,
};
use crate::constants::{
    AccessMode, AtnMode, AttrId, EventMechanism, EventType, FlushMask, LockKind, RenMode,
    StatusCode,
};
use crate::error::{Error, Result};

/// Process-wide library cache, one entry per canonical path.
static LIBRARIES: Lazy<Mutex<HashMap<PathBuf, Weak<VisaLibrary>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Installed handler hooks, keyed by the trampoline user slot.
static HOOKS: Lazy<Mutex<HashMap<u64, HandlerHook>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_HOOK_KEY: AtomicU64 = AtomicU64::new(1);

/// A loaded VISA implementation.
pub struct VisaLibrary {
    path: PathBuf,
    sym: SymbolTable,
    // Keeps the shared object mapped while the symbol table is callable.
    _lib: libloading::Library,
}

impl VisaLibrary {
    /// Load the library at `path`, or return the already-loaded instance
    /// for the same canonical path.
    pub fn get_or_load(path: &str) -> Result<Arc<VisaLibrary>> {
        if path.is_empty() {
            return Err(Error::Library {
                path: String::new(),
                reason: "no library path given; path discovery is provided by the embedding \
                         application"
                    .to_string(),
            });
        }

        let key = Path::new(path)
            .canonicalize()
            .unwrap_or_else(|_| PathBuf::from(path));

        let mut cache = LIBRARIES.lock();
        if let Some(live) = cache.get(&key).and_then(Weak::upgrade) {
            return Ok(live);
        }

        let lib = unsafe { libloading::Library::new(path) }.map_err(|e| Error::Library {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let sym = unsafe { SymbolTable::resolve(&lib, path) }?;

        let library = Arc::new(VisaLibrary {
            path: key.clone(),
            sym,
            _lib: lib,
        });
        cache.insert(key, Arc::downgrade(&library));
        log::debug!("loaded visa library {}", library.path.display());
        Ok(library)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Human-readable description of a status code, as reported by the
    /// library itself.
    pub fn describe_status(&self, session: Session, status: StatusCode) -> String {
        let mut buf = [0 as c_char; ffi::FIND_BUFLEN];
        let rc = unsafe { (self.sym.status_desc)(session.0, status.0, buf.as_mut_ptr()) };
        if StatusCode(rc).is_error() {
            return status.to_string();
        }
        ffi::from_c_buffer(&buf)
    }

    fn check(&self, status: ViStatus, op: &'static str, context: &str) -> Result<StatusCode> {
        let code = StatusCode(status);
        if code.is_error() {
            Err(Error::from_status(code, op, context))
        } else {
            Ok(code)
        }
    }
}

impl Drop for VisaLibrary {
    fn drop(&mut self) {
        // Only drop the cache entry if it still refers to this instance;
        // another thread may already have loaded a replacement.
        let mut cache = LIBRARIES.lock();
        if let Some(weak) = cache.get(&self.path) {
            if weak.strong_count() == 0 {
                cache.remove(&self.path);
            }
        }
        log::debug!("unloaded visa library {}", self.path.display());
    }
}

/// C-side entry point for all installed handlers. Looks up the hook by the
/// user slot and shields the backend from user panics.
unsafe extern "C" fn handler_trampoline(
    session: ViSession,
    event_type: ViEventType,
    context: ViEvent,
    user: ViAddr,
) -> ViStatus {
    let key = user as u64;
    let hook = HOOKS.lock().get(&key).cloned();
    if let (Some(hook), Some(ty)) = (hook, EventType::from_value(event_type)) {
        let ctx = (context != 0).then_some(EventContext(context));
        if catch_unwind(AssertUnwindSafe(|| (*hook)(Session(session), ty, ctx))).is_err() {
            log::error!(
                "event handler for {ty:?} on session {:#010X} panicked; suppressed",
                session
            );
        }
    }
    0
}

impl VisaBackend for VisaLibrary {
    fn name(&self) -> &str {
        "ivi"
    }

    fn open_default_rm(&self) -> Result<(Session, StatusCode)> {
        let mut session: ViSession = 0;
        let rc = unsafe { (self.sym.open_default_rm)(&mut session) };
        let status = self.check(rc, "open_default_rm", "")?;
        Ok((Session(session), status))
    }

    fn open(
        &self,
        rm: Session,
        resource_name: &str,
        access_mode: AccessMode,
        open_timeout_ms: u32,
    ) -> Result<(Session, StatusCode)> {
        let name = std::ffi::CString::new(resource_name)
            .map_err(|_| Error::parse(0, "resource name contains an interior NUL"))?;
        let mut session: ViSession = 0;
        let rc = unsafe {
            (self.sym.open)(
                rm.0,
                name.as_ptr(),
                access_mode.bits(),
                open_timeout_ms,
                &mut session,
            )
        };
        let status = self.check(rc, "open", resource_name)?;
        Ok((Session(session), status))
    }

    fn close(&self, session: Session) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.close)(session.0) };
        self.check(rc, "close", "")
    }

    fn list_resources(&self, rm: Session, pattern: &str) -> Result<Vec<String>> {
        let expr = std::ffi::CString::new(pattern)
            .map_err(|_| Error::parse(0, "pattern contains an interior NUL"))?;
        let mut list: ffi::ViFindList = 0;
        let mut count: u32 = 0;
        let mut desc = [0 as c_char; ffi::FIND_BUFLEN];

        let rc = unsafe {
            (self.sym.find_rsrc)(rm.0, expr.as_ptr(), &mut list, &mut count, desc.as_mut_ptr())
        };
        if StatusCode(rc) == StatusCode::ERROR_RSRC_NFOUND {
            return Ok(Vec::new());
        }
        self.check(rc, "list_resources", pattern)?;

        let mut names = Vec::with_capacity(count as usize);
        names.push(ffi::from_c_buffer(&desc));
        for _ in 1..count {
            let rc = unsafe { (self.sym.find_next)(list, desc.as_mut_ptr()) };
            if StatusCode(rc) == StatusCode::ERROR_RSRC_NFOUND {
                break;
            }
            self.check(rc, "list_resources", pattern)?;
            names.push(ffi::from_c_buffer(&desc));
        }

        let rc = unsafe { (self.sym.close)(list) };
        if StatusCode(rc).is_error() {
            log::warn!("closing find list failed with {}", StatusCode(rc));
        }
        Ok(names)
    }

    fn get_attribute(&self, session: Session, attr: AttrId) -> Result<(AttrValue, StatusCode)> {
        let kind = attributes::lookup(attr).map(|d| d.kind).unwrap_or(AttrKind::U64);

        if kind == AttrKind::Str {
            let mut buf = [0 as c_char; ffi::FIND_BUFLEN];
            let rc = unsafe {
                (self.sym.get_attribute)(session.0, attr.0, buf.as_mut_ptr() as *mut _)
            };
            let status = self.check(rc, "get_attribute", "")?;
            return Ok((AttrValue::Str(ffi::from_c_buffer(&buf)), status));
        }

        // All numeric attribute states fit a zero-initialized u64 cell.
        let mut cell: u64 = 0;
        let rc = unsafe {
            (self.sym.get_attribute)(session.0, attr.0, &mut cell as *mut u64 as *mut _)
        };
        let status = self.check(rc, "get_attribute", "")?;
        let value = match kind {
            AttrKind::Bool => AttrValue::Bool(cell as u16 != 0),
            AttrKind::U8 => AttrValue::U8(cell as u8),
            AttrKind::U16 | AttrKind::Enum | AttrKind::Flags => AttrValue::U16(cell as u16),
            AttrKind::I16 => AttrValue::I16(cell as u16 as i16),
            AttrKind::U32 => AttrValue::U32(cell as u32),
            AttrKind::U64 => AttrValue::U64(cell),
            AttrKind::Str => unreachable!(),
        };
        Ok((value, status))
    }

    fn set_attribute(
        &self,
        session: Session,
        attr: AttrId,
        value: AttrValue,
    ) -> Result<StatusCode> {
        let state = value.as_u64().ok_or(Error::Io {
            status: StatusCode::ERROR_NSUP_ATTR_STATE,
            op: "set_attribute",
        })?;
        let rc = unsafe { (self.sym.set_attribute)(session.0, attr.0, state) };
        self.check(rc, "set_attribute", "")
    }

    fn lock(
        &self,
        session: Session,
        kind: LockKind,
        timeout_ms: u32,
        requested_key: Option<&str>,
    ) -> Result<(Option<String>, StatusCode)> {
        let mode = match kind {
            LockKind::Exclusive => AccessMode::EXCLUSIVE_LOCK,
            LockKind::Shared => AccessMode::SHARED_LOCK,
        };
        let requested = match requested_key {
            Some(key) => Some(
                std::ffi::CString::new(key)
                    .map_err(|_| Error::parse(0, "lock key contains an interior NUL"))?,
            ),
            None => None,
        };
        let mut granted = [0 as c_char; ffi::FIND_BUFLEN];
        let rc = unsafe {
            (self.sym.lock)(
                session.0,
                mode.bits(),
                timeout_ms,
                requested.as_ref().map_or(std::ptr::null(), |k| k.as_ptr()),
                granted.as_mut_ptr(),
            )
        };
        let status = self.check(rc, "lock", "")?;
        let key = match kind {
            LockKind::Shared => Some(ffi::from_c_buffer(&granted)),
            LockKind::Exclusive => None,
        };
        Ok((key, status))
    }

    fn unlock(&self, session: Session) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.unlock)(session.0) };
        self.check(rc, "unlock", "")
    }

    fn read(&self, session: Session, count: usize) -> Result<(Vec<u8>, StatusCode)> {
        let request = u32::try_from(count).unwrap_or(u32::MAX);
        let mut buf = vec![0u8; request as usize];
        let mut ret: u32 = 0;
        let rc = unsafe { (self.sym.read)(session.0, buf.as_mut_ptr(), request, &mut ret) };
        let status = self.check(rc, "read", "")?;
        buf.truncate(ret as usize);
        Ok((buf, status))
    }

    fn write(&self, session: Session, data: &[u8]) -> Result<(usize, StatusCode)> {
        let count = u32::try_from(data.len()).map_err(|_| Error::Io {
            status: StatusCode::ERROR_INV_SIZE,
            op: "write",
        })?;
        let mut ret: u32 = 0;
        let rc = unsafe { (self.sym.write)(session.0, data.as_ptr(), count, &mut ret) };
        let status = self.check(rc, "write", "")?;
        Ok((ret as usize, status))
    }

    fn enable_event(
        &self,
        session: Session,
        event: EventType,
        mechanism: EventMechanism,
    ) -> Result<StatusCode> {
        let rc = unsafe {
            (self.sym.enable_event)(session.0, event.value(), mechanism.bits(), 0)
        };
        self.check(rc, "enable_event", "")
    }

    fn disable_event(
        &self,
        session: Session,
        event: EventType,
        mechanism: EventMechanism,
    ) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.disable_event)(session.0, event.value(), mechanism.bits()) };
        self.check(rc, "disable_event", "")
    }

    fn discard_events(
        &self,
        session: Session,
        event: EventType,
        mechanism: EventMechanism,
    ) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.discard_events)(session.0, event.value(), mechanism.bits()) };
        self.check(rc, "discard_events", "")
    }

    fn wait_on_event(
        &self,
        session: Session,
        event: EventType,
        timeout_ms: u32,
    ) -> Result<WaitEvent> {
        let mut out_type: ViEventType = 0;
        let mut out_context: ViEvent = 0;
        let rc = unsafe {
            (self.sym.wait_on_event)(
                session.0,
                event.value(),
                timeout_ms,
                &mut out_type,
                &mut out_context,
            )
        };
        let code = StatusCode(rc);
        if code == StatusCode::ERROR_TMO {
            return Ok(WaitEvent {
                event_type: event,
                context: None,
                timed_out: true,
                status: code,
            });
        }
        let status = self.check(rc, "wait_on_event", "")?;
        Ok(WaitEvent {
            event_type: EventType::from_value(out_type).unwrap_or(event),
            context: (out_context != 0).then_some(EventContext(out_context)),
            timed_out: false,
            status,
        })
    }

    fn install_handler(
        &self,
        session: Session,
        event: EventType,
        hook: HandlerHook,
    ) -> Result<(BackendHandle, StatusCode)> {
        let key = NEXT_HOOK_KEY.fetch_add(1, Ordering::Relaxed);
        HOOKS.lock().insert(key, hook);

        let rc = unsafe {
            (self.sym.install_handler)(
                session.0,
                event.value(),
                handler_trampoline,
                key as usize as ViAddr,
            )
        };
        match self.check(rc, "install_handler", "") {
            Ok(status) => Ok((BackendHandle(key), status)),
            Err(err) => {
                HOOKS.lock().remove(&key);
                Err(err)
            }
        }
    }

    fn uninstall_handler(
        &self,
        session: Session,
        event: EventType,
        handle: BackendHandle,
    ) -> Result<StatusCode> {
        let rc = unsafe {
            (self.sym.uninstall_handler)(
                session.0,
                event.value(),
                handler_trampoline,
                handle.0 as usize as ViAddr,
            )
        };
        let result = self.check(rc, "uninstall_handler", "");
        HOOKS.lock().remove(&handle.0);
        result
    }

    fn get_event_attribute(
        &self,
        context: EventContext,
        attr: AttrId,
    ) -> Result<(AttrValue, StatusCode)> {
        self.get_attribute(Session(context.0), attr)
    }

    fn close_event(&self, context: EventContext) -> Result<StatusCode> {
        self.close(Session(context.0))
    }

    fn assert_trigger(&self, session: Session, protocol: u16) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.assert_trigger)(session.0, protocol) };
        self.check(rc, "assert_trigger", "")
    }

    fn clear(&self, session: Session) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.clear)(session.0) };
        self.check(rc, "clear", "")
    }

    fn read_stb(&self, session: Session) -> Result<(u8, StatusCode)> {
        let mut stb: u16 = 0;
        let rc = unsafe { (self.sym.read_stb)(session.0, &mut stb) };
        let status = self.check(rc, "read_stb", "")?;
        Ok((stb as u8, status))
    }

    fn flush(&self, session: Session, mask: FlushMask) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.flush)(session.0, mask.bits()) };
        self.check(rc, "flush", "")
    }

    fn gpib_command(&self, session: Session, data: &[u8]) -> Result<(usize, StatusCode)> {
        let mut ret: u32 = 0;
        let rc = unsafe {
            (self.sym.gpib_command)(session.0, data.as_ptr(), data.len() as u32, &mut ret)
        };
        let status = self.check(rc, "gpib_command", "")?;
        Ok((ret as usize, status))
    }

    fn gpib_control_ren(&self, session: Session, mode: RenMode) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.gpib_control_ren)(session.0, mode.value()) };
        self.check(rc, "gpib_control_ren", "")
    }

    fn gpib_control_atn(&self, session: Session, mode: AtnMode) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.gpib_control_atn)(session.0, mode.value()) };
        self.check(rc, "gpib_control_atn", "")
    }

    fn gpib_send_ifc(&self, session: Session) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.gpib_send_ifc)(session.0) };
        self.check(rc, "gpib_send_ifc", "")
    }

    fn gpib_pass_control(
        &self,
        session: Session,
        primary: u16,
        secondary: u16,
    ) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.gpib_pass_control)(session.0, primary, secondary) };
        self.check(rc, "gpib_pass_control", "")
    }

    fn usb_control_in(
        &self,
        session: Session,
        request_type: i16,
        request: i16,
        value: u16,
        index: u16,
        length: u16,
    ) -> Result<(Vec<u8>, StatusCode)> {
        let mut buf = vec![0u8; length as usize];
        let mut ret: u16 = 0;
        let rc = unsafe {
            (self.sym.usb_control_in)(
                session.0,
                request_type,
                request,
                value,
                index,
                length,
                buf.as_mut_ptr(),
                &mut ret,
            )
        };
        let status = self.check(rc, "usb_control_in", "")?;
        buf.truncate(ret as usize);
        Ok((buf, status))
    }

    fn usb_control_out(
        &self,
        session: Session,
        request_type: i16,
        request: i16,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<StatusCode> {
        let rc = unsafe {
            (self.sym.usb_control_out)(
                session.0,
                request_type,
                request,
                value,
                index,
                data.len() as u16,
                data.as_ptr(),
            )
        };
        self.check(rc, "usb_control_out", "")
    }

    fn peek8(&self, session: Session, space: u16, offset: u64) -> Result<(u8, StatusCode)> {
        let mut value: u8 = 0;
        let rc = unsafe { (self.sym.in8)(session.0, space, offset, &mut value) };
        Ok((value, self.check(rc, "peek8", "")?))
    }

    fn peek16(&self, session: Session, space: u16, offset: u64) -> Result<(u16, StatusCode)> {
        let mut value: u16 = 0;
        let rc = unsafe { (self.sym.in16)(session.0, space, offset, &mut value) };
        Ok((value, self.check(rc, "peek16", "")?))
    }

    fn peek32(&self, session: Session, space: u16, offset: u64) -> Result<(u32, StatusCode)> {
        let mut value: u32 = 0;
        let rc = unsafe { (self.sym.in32)(session.0, space, offset, &mut value) };
        Ok((value, self.check(rc, "peek32", "")?))
    }

    fn peek64(&self, session: Session, space: u16, offset: u64) -> Result<(u64, StatusCode)> {
        let mut value: u64 = 0;
        let rc = unsafe { (self.sym.in64)(session.0, space, offset, &mut value) };
        Ok((value, self.check(rc, "peek64", "")?))
    }

    fn poke8(&self, session: Session, space: u16, offset: u64, value: u8) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.out8)(session.0, space, offset, value) };
        self.check(rc, "poke8", "")
    }

    fn poke16(&self, session: Session, space: u16, offset: u64, value: u16) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.out16)(session.0, space, offset, value) };
        self.check(rc, "poke16", "")
    }

    fn poke32(&self, session: Session, space: u16, offset: u64, value: u32) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.out32)(session.0, space, offset, value) };
        self.check(rc, "poke32", "")
    }

    fn poke64(&self, session: Session, space: u16, offset: u64, value: u64) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.out64)(session.0, space, offset, value) };
        self.check(rc, "poke64", "")
    }

    fn move_in(
        &self,
        session: Session,
        space: u16,
        offset: u64,
        length: u64,
    ) -> Result<(Vec<u8>, StatusCode)> {
        let mut buf = vec![0u8; length as usize];
        let rc = unsafe {
            (self.sym.move_in8)(session.0, space, offset, length, buf.as_mut_ptr())
        };
        let status = self.check(rc, "move_in", "")?;
        Ok((buf, status))
    }

    fn move_out(
        &self,
        session: Session,
        space: u16,
        offset: u64,
        data: &[u8],
    ) -> Result<StatusCode> {
        let rc = unsafe {
            (self.sym.move_out8)(session.0, space, offset, data.len() as u64, data.as_ptr())
        };
        self.check(rc, "move_out", "")
    }

    fn map_address(
        &self,
        session: Session,
        space: u16,
        base: u64,
        size: u64,
    ) -> Result<(u64, StatusCode)> {
        let mut mapped: ViAddr = std::ptr::null_mut();
        let rc = unsafe {
            (self.sym.map_address)(session.0, space, base, size, 0, std::ptr::null_mut(), &mut mapped)
        };
        let status = self.check(rc, "map_address", "")?;
        Ok((mapped as usize as u64, status))
    }

    fn unmap_address(&self, session: Session) -> Result<StatusCode> {
        let rc = unsafe { (self.sym.unmap_address)(session.0) };
        self.check(rc, "unmap_address", "")
    }
}
