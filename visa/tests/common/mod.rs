//! In-memory backend double used by the integration tests.
//!
//! Emulates the observable contract of a VISA implementation for
//! message-based devices: per-message END indication, termination
//! character reads, attribute storage with registry defaults, cooperative
//! locks, scripted event queues and synchronous handler dispatch. It is a
//! plain client of the backend capability trait.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use visa::attributes::{self, AttrDefault};
use visa::backend::{
    AttrValue, BackendHandle, EventContext, HandlerHook, Session, VisaBackend, WaitEvent,
};
use visa::constants::{
    AccessMode, AttrId, EventMechanism, EventType, FlushMask, LockKind, StatusCode,
};
use visa::error::{Error, Result};
use visa::rname;

type Responder = Box<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

#[derive(Default)]
struct Device {
    /// Pending instrument output; each entry ends with END.
    input: VecDeque<Vec<u8>>,
    /// Everything the host wrote, one entry per write call.
    written: Vec<Vec<u8>>,
    attrs: HashMap<u32, AttrValue>,
    responder: Option<Responder>,
    lock: Option<LockKind>,
    enabled: HashMap<EventType, EventMechanism>,
    queued_events: VecDeque<(EventType, Vec<(AttrId, AttrValue)>)>,
    handlers: Vec<(u64, EventType, HandlerHook)>,
    stb: u8,
    memory: HashMap<(u16, u64), u64>,
    clear_count: u32,
    trigger_count: u32,
}

enum Entry {
    Rm,
    Device(String),
}

/// Scripted in-memory backend.
pub struct TestBackend {
    devices: Mutex<HashMap<String, Arc<Mutex<Device>>>>,
    sessions: Mutex<HashMap<u32, Entry>>,
    contexts: Mutex<HashMap<u32, Vec<(AttrId, AttrValue)>>>,
    advertised: Mutex<Vec<String>>,
    next_session: AtomicU32,
    next_handle: AtomicU64,
}

#[allow(dead_code)]
impl TestBackend {
    pub fn new() -> Arc<TestBackend> {
        Arc::new(TestBackend {
            devices: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            contexts: Mutex::new(HashMap::new()),
            advertised: Mutex::new(Vec::new()),
            next_session: AtomicU32::new(0x100),
            next_handle: AtomicU64::new(1),
        })
    }

    /// Make a resource name discoverable.
    pub fn advertise(&self, name: &str) {
        self.advertised.lock().push(name.to_string());
    }

    fn device(&self, name: &str) -> Arc<Mutex<Device>> {
        self.devices
            .lock()
            .entry(name.to_ascii_uppercase())
            .or_default()
            .clone()
    }

    /// Queue one instrument message (delivered with END at its end).
    pub fn feed(&self, name: &str, message: &[u8]) {
        self.device(name).lock().input.push_back(message.to_vec());
    }

    /// Script responses to host writes.
    pub fn set_responder(
        &self,
        name: &str,
        responder: impl Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) {
        self.device(name).lock().responder = Some(Box::new(responder));
    }

    /// Everything written to the device so far.
    pub fn written(&self, name: &str) -> Vec<Vec<u8>> {
        self.device(name).lock().written.clone()
    }

    pub fn set_stb(&self, name: &str, stb: u8) {
        self.device(name).lock().stb = stb;
    }

    pub fn clear_count(&self, name: &str) -> u32 {
        self.device(name).lock().clear_count
    }

    pub fn trigger_count(&self, name: &str) -> u32 {
        self.device(name).lock().trigger_count
    }

    /// Queue an event for the queue mechanism.
    pub fn post_event(
        &self,
        name: &str,
        event_type: EventType,
        attrs: Vec<(AttrId, AttrValue)>,
    ) {
        self.device(name)
            .lock()
            .queued_events
            .push_back((event_type, attrs));
    }

    /// Synchronously dispatch an event to every installed handler, as a
    /// backend callback thread would.
    pub fn dispatch_handlers(
        &self,
        name: &str,
        event_type: EventType,
        attrs: Vec<(AttrId, AttrValue)>,
    ) {
        let (hooks, session) = {
            let sessions = self.sessions.lock();
            let session = sessions
                .iter()
                .find_map(|(id, entry)| match entry {
                    Entry::Device(n) if n.eq_ignore_ascii_case(name) => Some(*id),
                    _ => None,
                })
                .expect("no open session for device");
            let device = self.device(name);
            let device = device.lock();
            let hooks: Vec<HandlerHook> = device
                .handlers
                .iter()
                .filter(|(_, ty, _)| *ty == event_type)
                .map(|(_, _, hook)| hook.clone())
                .collect();
            (hooks, session)
        };

        for hook in hooks {
            let ctx = self.make_context(attrs.clone());
            (*hook)(Session(session), event_type, Some(ctx));
        }
    }

    fn make_context(&self, attrs: Vec<(AttrId, AttrValue)>) -> EventContext {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.contexts.lock().insert(id, attrs);
        EventContext(id)
    }

    fn entry_device(&self, session: Session) -> Result<Arc<Mutex<Device>>> {
        let sessions = self.sessions.lock();
        match sessions.get(&session.0) {
            Some(Entry::Device(name)) => Ok(self.device(name)),
            Some(Entry::Rm) | None => Err(Error::InvalidSession),
        }
    }

    fn default_attr(attr: AttrId) -> Result<AttrValue> {
        let descriptor = attributes::lookup(attr).ok_or(Error::Io {
            status: StatusCode::ERROR_NSUP_ATTR,
            op: "get_attribute",
        })?;
        let value = match descriptor.default {
            AttrDefault::Bool(b) => AttrValue::Bool(b),
            AttrDefault::UInt(v) => AttrValue::U64(v),
            AttrDefault::Str(s) => AttrValue::Str(s.to_string()),
            AttrDefault::None => {
                return Err(Error::Io {
                    status: StatusCode::ERROR_NSUP_ATTR,
                    op: "get_attribute",
                })
            }
        };
        Ok(value)
    }
}

impl VisaBackend for TestBackend {
    fn name(&self) -> &str {
        "test"
    }

    fn open_default_rm(&self) -> Result<(Session, StatusCode)> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().insert(id, Entry::Rm);
        Ok((Session(id), StatusCode::SUCCESS))
    }

    fn open(
        &self,
        rm: Session,
        resource_name: &str,
        _access_mode: AccessMode,
        _open_timeout_ms: u32,
    ) -> Result<(Session, StatusCode)> {
        {
            let sessions = self.sessions.lock();
            match sessions.get(&rm.0) {
                Some(Entry::Rm) => {}
                _ => return Err(Error::InvalidSession),
            }
        }
        if resource_name.to_ascii_uppercase().contains("MISSING") {
            return Err(Error::ResourceNotFound(resource_name.to_string()));
        }
        let _ = self.device(resource_name);
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .lock()
            .insert(id, Entry::Device(resource_name.to_ascii_uppercase()));
        Ok((Session(id), StatusCode::SUCCESS))
    }

    fn close(&self, session: Session) -> Result<StatusCode> {
        let mut sessions = self.sessions.lock();
        if sessions.remove(&session.0).is_some() {
            return Ok(StatusCode::SUCCESS);
        }
        drop(sessions);
        if self.contexts.lock().remove(&session.0).is_some() {
            return Ok(StatusCode::SUCCESS);
        }
        Err(Error::InvalidSession)
    }

    fn list_resources(&self, rm: Session, pattern: &str) -> Result<Vec<String>> {
        {
            let sessions = self.sessions.lock();
            match sessions.get(&rm.0) {
                Some(Entry::Rm) => {}
                _ => return Err(Error::InvalidSession),
            }
        }
        let advertised = self.advertised.lock();
        Ok(rname::filter(advertised.iter().map(String::as_str), pattern))
    }

    fn get_attribute(&self, session: Session, attr: AttrId) -> Result<(AttrValue, StatusCode)> {
        if let Some(attrs) = self.contexts.lock().get(&session.0) {
            let value = attrs
                .iter()
                .find(|(id, _)| *id == attr)
                .map(|(_, value)| value.clone())
                .ok_or(Error::Io {
                    status: StatusCode::ERROR_NSUP_ATTR,
                    op: "get_attribute",
                })?;
            return Ok((value, StatusCode::SUCCESS));
        }

        let device = self.entry_device(session)?;
        let device = device.lock();
        let value = match device.attrs.get(&attr.0) {
            Some(value) => value.clone(),
            None => Self::default_attr(attr)?,
        };
        Ok((value, StatusCode::SUCCESS))
    }

    fn set_attribute(
        &self,
        session: Session,
        attr: AttrId,
        value: AttrValue,
    ) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        device.lock().attrs.insert(attr.0, value);
        Ok(StatusCode::SUCCESS)
    }

    fn lock(
        &self,
        session: Session,
        kind: LockKind,
        _timeout_ms: u32,
        requested_key: Option<&str>,
    ) -> Result<(Option<String>, StatusCode)> {
        let device = self.entry_device(session)?;
        let mut device = device.lock();
        if device.lock.is_some() {
            return Err(Error::ResourceBusy("already locked".to_string()));
        }
        device.lock = Some(kind);
        let key = match kind {
            LockKind::Shared => Some(requested_key.unwrap_or("test-key").to_string()),
            LockKind::Exclusive => None,
        };
        Ok((key, StatusCode::SUCCESS))
    }

    fn unlock(&self, session: Session) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        let mut device = device.lock();
        if device.lock.take().is_none() {
            return Err(Error::Io {
                status: StatusCode::ERROR_SESN_NLOCKED,
                op: "unlock",
            });
        }
        Ok(StatusCode::SUCCESS)
    }

    fn read(&self, session: Session, count: usize) -> Result<(Vec<u8>, StatusCode)> {
        let device = self.entry_device(session)?;
        let mut device = device.lock();

        let termchar_enabled = device
            .attrs
            .get(&AttrId::TERMCHAR_EN.0)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false);
        let termchar = device
            .attrs
            .get(&AttrId::TERMCHAR.0)
            .and_then(AttrValue::as_u8)
            .unwrap_or(b'\n');

        let message = match device.input.front_mut() {
            Some(message) => message,
            None => {
                return Err(Error::Timeout {
                    op: "read",
                    timeout_ms: 0,
                })
            }
        };

        // Stop at the buffer count, the termination character (when
        // enabled) or the message end, whichever comes first.
        let mut take = message.len().min(count);
        let mut status = if take < message.len() {
            StatusCode::SUCCESS_MAX_CNT
        } else {
            StatusCode::SUCCESS
        };
        if termchar_enabled {
            if let Some(pos) = message[..take].iter().position(|&b| b == termchar) {
                if pos + 1 < take || status == StatusCode::SUCCESS_MAX_CNT {
                    status = StatusCode::SUCCESS_TERM_CHAR;
                }
                take = pos + 1;
                if take == message.len() {
                    status = StatusCode::SUCCESS;
                }
            }
        }

        let data: Vec<u8> = message.drain(..take).collect();
        let exhausted = message.is_empty();
        if exhausted {
            device.input.pop_front();
        }
        Ok((data, status))
    }

    fn write(&self, session: Session, data: &[u8]) -> Result<(usize, StatusCode)> {
        let device = self.entry_device(session)?;
        let mut device = device.lock();
        device.written.push(data.to_vec());
        if let Some(responder) = &device.responder {
            if let Some(response) = responder(data) {
                device.input.push_back(response);
            }
        }
        Ok((data.len(), StatusCode::SUCCESS))
    }

    fn enable_event(
        &self,
        session: Session,
        event: EventType,
        mechanism: EventMechanism,
    ) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        let mut device = device.lock();
        let entry = device.enabled.entry(event).or_insert(EventMechanism::empty());
        *entry |= mechanism;
        Ok(StatusCode::SUCCESS)
    }

    fn disable_event(
        &self,
        session: Session,
        event: EventType,
        mechanism: EventMechanism,
    ) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        let mut device = device.lock();
        match device.enabled.get_mut(&event) {
            Some(entry) => {
                *entry &= !mechanism;
                if entry.is_empty() {
                    device.enabled.remove(&event);
                }
                Ok(StatusCode::SUCCESS)
            }
            None => Err(Error::Io {
                status: StatusCode::ERROR_NENABLED,
                op: "disable_event",
            }),
        }
    }

    fn discard_events(
        &self,
        session: Session,
        event: EventType,
        _mechanism: EventMechanism,
    ) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        let mut device = device.lock();
        device.queued_events.retain(|(ty, _)| *ty != event);
        Ok(StatusCode::SUCCESS)
    }

    fn wait_on_event(
        &self,
        session: Session,
        event: EventType,
        _timeout_ms: u32,
    ) -> Result<WaitEvent> {
        let device = self.entry_device(session)?;
        let queued = {
            let mut device = device.lock();
            let enabled = device
                .enabled
                .get(&event)
                .copied()
                .unwrap_or(EventMechanism::empty());
            if !enabled.contains(EventMechanism::QUEUE) {
                return Err(Error::Io {
                    status: StatusCode::ERROR_NENABLED,
                    op: "wait_on_event",
                });
            }
            let idx = device.queued_events.iter().position(|(ty, _)| *ty == event);
            idx.and_then(|idx| device.queued_events.remove(idx))
        };

        match queued {
            Some((event_type, attrs)) => Ok(WaitEvent {
                event_type,
                context: Some(self.make_context(attrs)),
                timed_out: false,
                status: StatusCode::SUCCESS,
            }),
            None => Ok(WaitEvent {
                event_type: event,
                context: None,
                timed_out: true,
                status: StatusCode::ERROR_TMO,
            }),
        }
    }

    fn install_handler(
        &self,
        session: Session,
        event: EventType,
        hook: HandlerHook,
    ) -> Result<(BackendHandle, StatusCode)> {
        let device = self.entry_device(session)?;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        device.lock().handlers.push((handle, event, hook));
        Ok((BackendHandle(handle), StatusCode::SUCCESS))
    }

    fn uninstall_handler(
        &self,
        session: Session,
        event: EventType,
        handle: BackendHandle,
    ) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        let mut device = device.lock();
        let before = device.handlers.len();
        device
            .handlers
            .retain(|(id, ty, _)| !(*id == handle.0 && *ty == event));
        if device.handlers.len() == before {
            return Err(Error::Io {
                status: StatusCode::ERROR_INV_HNDLR_REF,
                op: "uninstall_handler",
            });
        }
        Ok(StatusCode::SUCCESS)
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

    fn clear(&self, session: Session) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        let mut device = device.lock();
        device.input.clear();
        device.clear_count += 1;
        Ok(StatusCode::SUCCESS)
    }

    fn read_stb(&self, session: Session) -> Result<(u8, StatusCode)> {
        let device = self.entry_device(session)?;
        let stb = device.lock().stb;
        Ok((stb, StatusCode::SUCCESS))
    }

    fn flush(&self, session: Session, _mask: FlushMask) -> Result<StatusCode> {
        self.entry_device(session)?;
        Ok(StatusCode::SUCCESS)
    }

    fn assert_trigger(&self, session: Session, _protocol: u16) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        device.lock().trigger_count += 1;
        Ok(StatusCode::SUCCESS)
    }

    fn gpib_command(&self, session: Session, data: &[u8]) -> Result<(usize, StatusCode)> {
        let device = self.entry_device(session)?;
        device.lock().written.push(data.to_vec());
        Ok((data.len(), StatusCode::SUCCESS))
    }

    fn peek8(&self, session: Session, space: u16, offset: u64) -> Result<(u8, StatusCode)> {
        let device = self.entry_device(session)?;
        let value = device.lock().memory.get(&(space, offset)).copied().unwrap_or(0);
        Ok((value as u8, StatusCode::SUCCESS))
    }

    fn peek32(&self, session: Session, space: u16, offset: u64) -> Result<(u32, StatusCode)> {
        let device = self.entry_device(session)?;
        let value = device.lock().memory.get(&(space, offset)).copied().unwrap_or(0);
        Ok((value as u32, StatusCode::SUCCESS))
    }

    fn poke8(&self, session: Session, space: u16, offset: u64, value: u8) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        device.lock().memory.insert((space, offset), value as u64);
        Ok(StatusCode::SUCCESS)
    }

    fn poke32(&self, session: Session, space: u16, offset: u64, value: u32) -> Result<StatusCode> {
        let device = self.entry_device(session)?;
        device.lock().memory.insert((space, offset), value as u64);
        Ok(StatusCode::SUCCESS)
    }
}
