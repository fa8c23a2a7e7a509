//! Base resource: session state, attribute properties, locking and events.
//!
//! Every concrete resource type wraps a shared [`ResourceCore`]. All
//! backend calls touching the session serialize on the core's operation
//! mutex, making each resource safe to drive from multiple threads.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::attributes;
use crate::backend::{AttrValue, BackendArc, Session, VisaBackend};
use crate::constants::{
    AttrId, EventMechanism, EventType, IoProtocol, LockKind, StatusCode, Timeout,
};
use crate::error::{Error, Result};
use crate::event::{Event, EventState, HandlerId, InstalledHandler, UserHandler, WaitResponse};
use crate::resources::messagebased::IoConfig;
use crate::rname::{Board, ResourceName};

/// Shared state of one open resource.
pub struct ResourceCore {
    backend: BackendArc,
    session: Mutex<Option<Session>>,
    rname: ResourceName,
    canonical: String,
    last_status: Mutex<StatusCode>,
    /// Serializes every backend call touching the session.
    op: Mutex<()>,
    /// Warning statuses currently suppressed by scope guards.
    suppressed: Mutex<Vec<StatusCode>>,
    /// Cached timeout for error context; kept in sync by the setters.
    timeout_ms: Mutex<u32>,
    pub(crate) events: EventState,
    pub(crate) io_cfg: Mutex<IoConfig>,
}

impl ResourceCore {
    pub(crate) fn new(backend: BackendArc, rname: ResourceName, session: Session) -> Arc<Self> {
        let canonical = rname.to_string();
        Arc::new(ResourceCore {
            backend,
            session: Mutex::new(Some(session)),
            rname,
            canonical,
            last_status: Mutex::new(StatusCode::SUCCESS),
            op: Mutex::new(()),
            suppressed: Mutex::new(Vec::new()),
            timeout_ms: Mutex::new(2000),
            events: EventState::default(),
            io_cfg: Mutex::new(IoConfig::default()),
        })
    }

    pub fn backend(&self) -> &BackendArc {
        &self.backend
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical
    }

    pub fn parsed_name(&self) -> &ResourceName {
        &self.rname
    }

    /// The original spelling of a non-numeric board, if any.
    pub fn alias(&self) -> Option<&str> {
        match &self.rname.board {
            Board::Alias(alias) => Some(alias),
            Board::Number(_) => None,
        }
    }

    pub fn session(&self) -> Result<Session> {
        self.session.lock().ok_or(Error::InvalidSession)
    }

    pub fn is_closed(&self) -> bool {
        self.session.lock().is_none()
    }

    pub fn last_status(&self) -> StatusCode {
        *self.last_status.lock()
    }

    pub(crate) fn cached_timeout_ms(&self) -> u32 {
        *self.timeout_ms.lock()
    }

    pub(crate) fn cache_timeout_ms(&self, timeout_ms: u32) {
        *self.timeout_ms.lock() = timeout_ms;
    }

    fn record_status(&self, op: &'static str, status: StatusCode) {
        *self.last_status.lock() = status;
        if status.is_warning() && !self.suppressed.lock().contains(&status) {
            log::warn!(
                "{}: {op} completed with {status} (session {})",
                self.canonical,
                self.session
                    .lock()
                    .map_or_else(|| "closed".to_string(), |s| s.to_string()),
            );
        }
    }

    /// Run one backend call against the live session, serialized with
    /// every other operation on this resource. Records the resulting
    /// status; timeouts pick up the cached timeout for diagnostics.
    pub(crate) fn with_session<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&dyn VisaBackend, Session) -> Result<(T, StatusCode)>,
    ) -> Result<T> {
        let _guard = self.op.lock();
        let session = self.session()?;
        match f(self.backend.as_ref(), session) {
            Ok((value, status)) => {
                self.record_status(op, status);
                Ok(value)
            }
            Err(err) => {
                if let Some(status) = err.status() {
                    *self.last_status.lock() = status;
                }
                log::debug!("{}: {op} failed: {err}", self.canonical);
                Err(err.with_timeout(self.cached_timeout_ms()))
            }
        }
    }

    /// Like `with_session` for calls whose only result is the status.
    pub(crate) fn run(
        &self,
        op: &'static str,
        f: impl FnOnce(&dyn VisaBackend, Session) -> Result<StatusCode>,
    ) -> Result<()> {
        self.with_session(op, |backend, session| f(backend, session).map(|s| ((), s)))
    }

    pub(crate) fn push_suppressed(&self, status: StatusCode) {
        self.suppressed.lock().push(status);
    }

    pub(crate) fn pop_suppressed(&self, status: StatusCode) {
        let mut suppressed = self.suppressed.lock();
        if let Some(idx) = suppressed.iter().rposition(|s| *s == status) {
            suppressed.remove(idx);
        }
    }

    /// Close the session: disable events, uninstall handlers, release the
    /// session handle. Idempotent; a second close is a no-op.
    pub fn close(&self) -> Result<()> {
        let _guard = self.op.lock();
        let session = match self.session.lock().take() {
            Some(session) => session,
            None => return Ok(()),
        };

        for (event_type, mechanism) in self.events.drain_enabled() {
            if let Err(err) = self.backend.disable_event(session, event_type, mechanism) {
                log::debug!("{}: disabling {event_type:?} on close: {err}", self.canonical);
            }
        }
        for (event_type, handle) in self.events.drain_handlers() {
            if let Err(err) = self.backend.uninstall_handler(session, event_type, handle) {
                log::debug!(
                    "{}: uninstalling handler for {event_type:?} on close: {err}",
                    self.canonical
                );
            }
        }

        let status = self.backend.close(session)?;
        *self.last_status.lock() = status;
        log::debug!("{}: closed session {session}", self.canonical);
        Ok(())
    }
}

impl Drop for ResourceCore {
    fn drop(&mut self) {
        // Scope-exit guarantee: dropping the last handle closes the session.
        let _ = self.close();
    }
}

/// Releases a cooperative lock on every exit path, including unwinding.
#[must_use = "the lock is released when the guard is dropped"]
pub struct LockGuard<'a> {
    core: &'a ResourceCore,
    key: Option<String>,
}

impl LockGuard<'_> {
    /// Access key granted for a shared lock.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.core.run("unlock", |backend, session| backend.unlock(session)) {
            log::debug!("{}: unlock on scope exit: {err}", self.core.canonical);
        }
    }
}

/// Suppresses one warning status for the guard's lifetime.
#[must_use = "the warning is only suppressed while the guard lives"]
pub struct WarningGuard<'a> {
    core: &'a ResourceCore,
    status: StatusCode,
}

impl Drop for WarningGuard<'_> {
    fn drop(&mut self) {
        self.core.pop_suppressed(self.status);
    }
}

/// Base surface shared by every resource kind.
pub trait Resource {
    fn core(&self) -> &ResourceCore;

    /// Human-readable name of the concrete resource kind.
    fn kind_name(&self) -> &'static str;

    fn session(&self) -> Result<Session> {
        self.core().session()
    }

    /// Canonical resource name.
    fn resource_name(&self) -> &str {
        self.core().canonical_name()
    }

    fn parsed_name(&self) -> &ResourceName {
        self.core().parsed_name()
    }

    fn interface_type(&self) -> crate::constants::InterfaceType {
        self.core().parsed_name().interface_type()
    }

    fn resource_class(&self) -> crate::constants::ResourceClass {
        self.core().parsed_name().resource_class()
    }

    fn is_closed(&self) -> bool {
        self.core().is_closed()
    }

    /// Parsed identity of this resource, including the preserved alias
    /// for non-numeric serial boards.
    fn resource_info(&self) -> crate::rm::ResourceInfo {
        crate::rm::ResourceInfo::from_parsed(self.core().parsed_name().clone())
    }

    /// Status observed by the most recent operation.
    fn last_status(&self) -> StatusCode {
        self.core().last_status()
    }

    /// Alias of [`Resource::last_status`] using the VISA name.
    fn visa_status(&self) -> StatusCode {
        self.core().last_status()
    }

    fn get_visa_attribute(&self, id: AttrId) -> Result<AttrValue> {
        self.core()
            .with_session("get_attribute", |backend, session| {
                backend.get_attribute(session, id)
            })
    }

    fn set_visa_attribute(&self, id: AttrId, value: AttrValue) -> Result<()> {
        if let Some(raw) = value.as_u64() {
            if !attributes::in_range(id, raw) {
                return Err(Error::Io {
                    status: StatusCode::ERROR_NSUP_ATTR_STATE,
                    op: "set_attribute",
                });
            }
        }
        if id == AttrId::TMO_VALUE {
            if let Some(raw) = value.as_u32() {
                self.core().cache_timeout_ms(raw);
            }
        }
        self.core().run("set_attribute", |backend, session| {
            backend.set_attribute(session, id, value)
        })
    }

    /// Timeout for blocking operations. Raw `0` reads back as immediate,
    /// the reserved sentinel as infinite.
    fn timeout(&self) -> Result<Timeout> {
        let raw = self
            .get_visa_attribute(AttrId::TMO_VALUE)?
            .as_u32()
            .unwrap_or(0);
        Ok(Timeout::from_raw(raw))
    }

    fn set_timeout(&self, timeout: Timeout) -> Result<()> {
        self.set_visa_attribute(AttrId::TMO_VALUE, AttrValue::U32(timeout.as_raw()))
    }

    fn spec_version(&self) -> Result<u32> {
        self.get_visa_attribute(AttrId::RSRC_SPEC_VERSION)?
            .as_u32()
            .ok_or(Error::Io {
                status: StatusCode::ERROR_NSUP_ATTR,
                op: "spec_version",
            })
    }

    fn implementation_version(&self) -> Result<u32> {
        self.get_visa_attribute(AttrId::RSRC_IMPL_VERSION)?
            .as_u32()
            .ok_or(Error::Io {
                status: StatusCode::ERROR_NSUP_ATTR,
                op: "implementation_version",
            })
    }

    fn resource_manufacturer_name(&self) -> Result<String> {
        Ok(self
            .get_visa_attribute(AttrId::RSRC_MANF_NAME)?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    fn io_protocol(&self) -> Result<IoProtocol> {
        let raw = self
            .get_visa_attribute(AttrId::IO_PROT)?
            .as_u16()
            .unwrap_or(1);
        Ok(IoProtocol::from_value(raw).unwrap_or(IoProtocol::Normal))
    }

    fn set_io_protocol(&self, protocol: IoProtocol) -> Result<()> {
        self.set_visa_attribute(AttrId::IO_PROT, AttrValue::U16(protocol.value()))
    }

    // --- locking --------------------------------------------------------

    /// Acquire a cooperative lock; for shared locks the granted access key
    /// is returned.
    fn lock(
        &self,
        kind: LockKind,
        timeout_ms: u32,
        requested_key: Option<&str>,
    ) -> Result<Option<String>> {
        self.core().with_session("lock", |backend, session| {
            backend.lock(session, kind, timeout_ms, requested_key)
        })
    }

    fn lock_exclusive(&self, timeout_ms: u32) -> Result<()> {
        self.lock(LockKind::Exclusive, timeout_ms, None).map(|_| ())
    }

    fn unlock(&self) -> Result<()> {
        self.core().run("unlock", |backend, session| backend.unlock(session))
    }

    /// Scoped lock: released when the guard drops, on success, error
    /// return or unwind alike.
    fn lock_guard(
        &self,
        kind: LockKind,
        timeout_ms: u32,
        requested_key: Option<&str>,
    ) -> Result<LockGuard<'_>> {
        let key = self.lock(kind, timeout_ms, requested_key)?;
        Ok(LockGuard {
            core: self.core(),
            key,
        })
    }

    /// Suppress a warning status for the guard's lifetime; suppressed
    /// warnings are still recorded in `last_status` but not logged.
    fn ignore_warning(&self, status: StatusCode) -> WarningGuard<'_> {
        self.core().push_suppressed(status);
        WarningGuard {
            core: self.core(),
            status,
        }
    }

    // --- events ---------------------------------------------------------

    /// Enable delivery of `event_type` via `mechanism`. Enabling an
    /// already-enabled pair is a no-op.
    fn enable_event(&self, event_type: EventType, mechanism: EventMechanism) -> Result<()> {
        let missing = self.core().events.missing(event_type, mechanism);
        if missing.is_empty() {
            return Ok(());
        }
        self.core().run("enable_event", |backend, session| {
            backend.enable_event(session, event_type, missing)
        })?;
        self.core().events.mark_enabled(event_type, missing);
        Ok(())
    }

    fn disable_event(&self, event_type: EventType, mechanism: EventMechanism) -> Result<()> {
        let enabled = self.core().events.enabled_mechanisms(event_type);
        let to_disable = enabled & mechanism;
        if to_disable.is_empty() {
            return Ok(());
        }
        self.core().run("disable_event", |backend, session| {
            backend.disable_event(session, event_type, to_disable)
        })?;
        self.core().events.mark_disabled(event_type, to_disable);
        Ok(())
    }

    /// Empty the event queue (or suspended-handler backlog) without
    /// touching the enablement state.
    fn discard_events(&self, event_type: EventType, mechanism: EventMechanism) -> Result<()> {
        self.core().run("discard_events", |backend, session| {
            backend.discard_events(session, event_type, mechanism)
        })
    }

    /// Wait for a queued event. A timeout is not an error: the response
    /// carries `timed_out = true` and a synthesized event of the requested
    /// type.
    fn wait_on_event(&self, event_type: EventType, timeout_ms: u32) -> Result<WaitResponse> {
        let core = self.core();
        let wait = core.with_session("wait_on_event", |backend, session| {
            backend
                .wait_on_event(session, event_type, timeout_ms)
                .map(|wait| {
                    let status = wait.status;
                    (wait, status)
                })
        })?;

        let session = core.session()?;
        if wait.timed_out {
            return Ok(WaitResponse {
                event: Event::synthesized(event_type, core.canonical_name().to_string(), session),
                timed_out: true,
            });
        }

        let event = Event::snapshot(
            core.backend().as_ref(),
            core.canonical_name().to_string(),
            session,
            wait.event_type,
            wait.context,
        );
        if let Some(context) = wait.context {
            if let Err(err) = core.backend().close_event(context) {
                log::debug!("{}: releasing event context: {err}", core.canonical_name());
            }
        }
        Ok(WaitResponse {
            event,
            timed_out: false,
        })
    }

    /// Install `handler` for `event_type`. The callback may fire on a
    /// backend thread; panics are caught at the dispatch boundary and
    /// logged. Installing the same callable twice yields distinct ids.
    fn install_handler(
        &self,
        event_type: EventType,
        handler: UserHandler,
        user_handle: Option<u64>,
    ) -> Result<HandlerId> {
        let core = self.core();
        let backend_weak = Arc::downgrade(core.backend());
        let resource_name = core.canonical_name().to_string();

        let hook: crate::backend::HandlerHook = Arc::new(move |session, ty, context| {
            let event = match backend_weak.upgrade() {
                Some(backend) => {
                    Event::snapshot(backend.as_ref(), resource_name.clone(), session, ty, context)
                }
                None => Event::synthesized(ty, resource_name.clone(), session),
            };
            // The dispatcher boundary: user panics must not cross into
            // the backend.
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (*handler)(&event, user_handle)
            }));
            if outcome.is_err() {
                log::error!(
                    "{}: handler for {ty:?} panicked; suppressed",
                    event.resource_name
                );
            }
        });

        let backend_handle = core.with_session("install_handler", |backend, session| {
            backend.install_handler(session, event_type, hook)
        })?;

        let id = HandlerId(backend_handle.0);
        core.events.record_handler(
            event_type,
            InstalledHandler {
                id,
                backend_handle,
            },
        );
        Ok(id)
    }

    /// Uninstall a handler using the id produced at install time.
    fn uninstall_handler(&self, event_type: EventType, id: HandlerId) -> Result<()> {
        let core = self.core();
        let handle = core
            .events
            .take_handler(event_type, id)
            .ok_or(Error::Io {
                status: StatusCode::ERROR_INV_HNDLR_REF,
                op: "uninstall_handler",
            })?;
        core.run("uninstall_handler", |backend, session| {
            backend.uninstall_handler(session, event_type, handle)
        })
    }

    // --- common bus operations ------------------------------------------

    /// Clear the device (e.g. GPIB SDC, USBTMC INITIATE_CLEAR).
    fn clear(&self) -> Result<()> {
        self.core().run("clear", |backend, session| backend.clear(session))
    }

    /// Read the IEEE-488.2 status byte.
    fn read_stb(&self) -> Result<u8> {
        self.core()
            .with_session("read_stb", |backend, session| backend.read_stb(session))
    }

    /// Close the resource. Idempotent: closing twice is a no-op and
    /// operations after close fail with `InvalidSession`.
    fn close(&self) -> Result<()> {
        self.core().close()
    }
}
