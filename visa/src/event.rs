//! Event objects, per-resource enablement state and handler bookkeeping.
//!
//! An [`Event`] snapshots the relevant event-context attributes at dispatch
//! time, so it stays valid after the backend reclaims the context. Session
//! I/O (e.g. reading the status byte after a service request) is left to
//! the caller to keep handler threads off the resource's I/O path.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::backend::{AttrValue, BackendHandle, EventContext, Session, VisaBackend};
use crate::constants::{AttrId, EventMechanism, EventType, StatusCode};

/// Opaque identifier of one installed handler; produced at install time
/// and required to uninstall. Installing the same callable twice yields
/// distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) u64);

/// User-facing event callback. Receives the event and the user handle the
/// callback was installed with. May run on a backend thread concurrently
/// with the main thread.
pub type UserHandler = std::sync::Arc<dyn Fn(&Event, Option<u64>) + Send + Sync>;

/// An asynchronous notification delivered by the backend.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: EventType,
    /// Canonical name of the resource the event belongs to.
    pub resource_name: String,
    pub session: Session,
    attrs: Vec<(AttrId, AttrValue)>,
}

impl Event {
    /// Synthesized event used for timed-out waits; carries no attributes.
    pub(crate) fn synthesized(
        event_type: EventType,
        resource_name: String,
        session: Session,
    ) -> Event {
        Event {
            event_type,
            resource_name,
            session,
            attrs: Vec::new(),
        }
    }

    /// Snapshot the relevant context attributes for `event_type`.
    ///
    /// Attributes the backend cannot supply are simply absent; the context
    /// may be reclaimed right after this returns.
    pub(crate) fn snapshot(
        backend: &dyn VisaBackend,
        resource_name: String,
        session: Session,
        event_type: EventType,
        context: Option<EventContext>,
    ) -> Event {
        let mut attrs = Vec::new();
        if let Some(context) = context {
            for attr in relevant_attrs(event_type) {
                if let Ok((value, _)) = backend.get_event_attribute(context, *attr) {
                    attrs.push((*attr, value));
                }
            }
        }
        Event {
            event_type,
            resource_name,
            session,
            attrs,
        }
    }

    /// Value of a snapshotted attribute.
    pub fn attribute(&self, id: AttrId) -> Option<&AttrValue> {
        self.attrs.iter().find(|(a, _)| *a == id).map(|(_, v)| v)
    }

    /// Status of the operation that raised the event, if snapshotted.
    pub fn status(&self) -> Option<StatusCode> {
        self.attribute(AttrId::STATUS)
            .and_then(AttrValue::as_u32)
            .map(|raw| StatusCode(raw as i32))
    }

    /// Byte count of a completed asynchronous transfer.
    pub fn return_count(&self) -> Option<u64> {
        self.attribute(AttrId::RET_COUNT).and_then(AttrValue::as_u64)
    }

    pub fn job_id(&self) -> Option<u32> {
        self.attribute(AttrId::JOB_ID).and_then(AttrValue::as_u32)
    }
}

fn relevant_attrs(event_type: EventType) -> &'static [AttrId] {
    match event_type {
        EventType::IoCompletion => &[
            AttrId::STATUS,
            AttrId::JOB_ID,
            AttrId::RET_COUNT,
            AttrId::OPER_NAME,
        ],
        EventType::Exception => &[AttrId::STATUS, AttrId::OPER_NAME],
        EventType::Trig => &[AttrId::RECV_TRIG_ID],
        EventType::VxiSignal | EventType::VxiVmeIntr => &[AttrId::SIGP_STATUS_ID],
        EventType::UsbIntr => &[AttrId::STATUS],
        _ => &[],
    }
}

/// Response of a queue wait. A timeout is reported here, not as an error;
/// the event is then synthesized with the requested type.
#[derive(Debug, Clone)]
pub struct WaitResponse {
    pub event: Event,
    pub timed_out: bool,
}

pub(crate) struct InstalledHandler {
    pub id: HandlerId,
    pub backend_handle: BackendHandle,
}

/// Per-resource event bookkeeping: which (type, mechanism) pairs are
/// enabled and which handlers are installed. Guarded for concurrent
/// install/uninstall against dispatch threads.
#[derive(Default)]
pub(crate) struct EventState {
    enabled: Mutex<HashMap<EventType, EventMechanism>>,
    handlers: Mutex<HashMap<EventType, Vec<InstalledHandler>>>,
}

impl EventState {
    /// Mechanisms not yet enabled for `event_type` out of `wanted`.
    /// Empty means the enable is a no-op.
    pub fn missing(&self, event_type: EventType, wanted: EventMechanism) -> EventMechanism {
        let enabled = self.enabled.lock();
        let current = enabled
            .get(&event_type)
            .copied()
            .unwrap_or(EventMechanism::empty());
        wanted.difference(current)
    }

    pub fn mark_enabled(&self, event_type: EventType, mechanism: EventMechanism) {
        let mut enabled = self.enabled.lock();
        let entry = enabled.entry(event_type).or_insert(EventMechanism::empty());
        *entry |= mechanism;
    }

    pub fn mark_disabled(&self, event_type: EventType, mechanism: EventMechanism) {
        let mut enabled = self.enabled.lock();
        if let Some(entry) = enabled.get_mut(&event_type) {
            *entry &= !mechanism;
            if entry.is_empty() {
                enabled.remove(&event_type);
            }
        }
    }

    pub fn enabled_mechanisms(&self, event_type: EventType) -> EventMechanism {
        self.enabled
            .lock()
            .get(&event_type)
            .copied()
            .unwrap_or(EventMechanism::empty())
    }

    /// Drain every enabled (type, mechanism) pair; used by close.
    pub fn drain_enabled(&self) -> Vec<(EventType, EventMechanism)> {
        self.enabled.lock().drain().collect()
    }

    pub fn record_handler(&self, event_type: EventType, handler: InstalledHandler) {
        self.handlers
            .lock()
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Remove one handler registration, returning its backend handle.
    pub fn take_handler(&self, event_type: EventType, id: HandlerId) -> Option<BackendHandle> {
        let mut handlers = self.handlers.lock();
        let list = handlers.get_mut(&event_type)?;
        let idx = list.iter().position(|h| h.id == id)?;
        let removed = list.swap_remove(idx);
        if list.is_empty() {
            handlers.remove(&event_type);
        }
        Some(removed.backend_handle)
    }

    /// Drain every installed handler; used by close.
    pub fn drain_handlers(&self) -> Vec<(EventType, BackendHandle)> {
        let mut handlers = self.handlers.lock();
        handlers
            .drain()
            .flat_map(|(ty, list)| list.into_iter().map(move |h| (ty, h.backend_handle)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_is_idempotent() {
        let state = EventState::default();
        let srq = EventType::ServiceRequest;

        assert_eq!(state.missing(srq, EventMechanism::QUEUE), EventMechanism::QUEUE);
        state.mark_enabled(srq, EventMechanism::QUEUE);
        assert!(state.missing(srq, EventMechanism::QUEUE).is_empty());

        // Adding the handler mechanism only reports the new bit.
        let both = EventMechanism::QUEUE | EventMechanism::HANDLER;
        assert_eq!(state.missing(srq, both), EventMechanism::HANDLER);
    }

    #[test]
    fn disable_restores_pre_enable_state() {
        let state = EventState::default();
        let srq = EventType::ServiceRequest;

        state.mark_enabled(srq, EventMechanism::QUEUE | EventMechanism::HANDLER);
        state.mark_disabled(srq, EventMechanism::HANDLER);
        assert_eq!(state.enabled_mechanisms(srq), EventMechanism::QUEUE);

        state.mark_disabled(srq, EventMechanism::QUEUE);
        assert!(state.enabled_mechanisms(srq).is_empty());
        assert!(state.drain_enabled().is_empty());
    }

    #[test]
    fn handler_bookkeeping() {
        let state = EventState::default();
        let srq = EventType::ServiceRequest;

        state.record_handler(
            srq,
            InstalledHandler {
                id: HandlerId(1),
                backend_handle: BackendHandle(11),
            },
        );
        state.record_handler(
            srq,
            InstalledHandler {
                id: HandlerId(2),
                backend_handle: BackendHandle(22),
            },
        );

        assert_eq!(state.take_handler(srq, HandlerId(1)), Some(BackendHandle(11)));
        assert_eq!(state.take_handler(srq, HandlerId(1)), None);
        assert_eq!(state.drain_handlers(), vec![(srq, BackendHandle(22))]);
    }

    #[test]
    fn synthesized_event_has_no_attributes() {
        let event = Event::synthesized(
            EventType::ServiceRequest,
            "GPIB0::5::INSTR".into(),
            Session(7),
        );
        assert_eq!(event.event_type, EventType::ServiceRequest);
        assert!(event.status().is_none());
        assert!(event.attribute(AttrId::STATUS).is_none());
    }
}
