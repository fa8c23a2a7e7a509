//! Resource manager: owns the default-RM session, discovers resources and
//! opens typed resources, tracking them for orderly shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::{resolve_backend, AttrValue, BackendArc, Session};
use crate::constants::{AccessMode, AttrId, InterfaceType, ResourceClass, DEFAULT_FIND_PATTERN};
use crate::error::{Error, Result};
use crate::resources::{dispatch, AnyResource, Resource, ResourceCore};
use crate::rname::{Board, ResourceKind, ResourceName};

/// Parsed identity of a discovered resource.
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    /// Canonical resource name.
    pub resource_name: String,
    pub interface_type: InterfaceType,
    pub resource_class: ResourceClass,
    pub board: Board,
    /// Original spelling of a non-numeric board (device path, `COMn`).
    pub alias: Option<String>,
    pub parsed: ResourceName,
}

impl ResourceInfo {
    pub(crate) fn from_parsed(parsed: ResourceName) -> ResourceInfo {
        let alias = match &parsed.board {
            Board::Alias(alias) => Some(alias.clone()),
            Board::Number(_) => None,
        };
        ResourceInfo {
            resource_name: parsed.to_string(),
            interface_type: parsed.interface_type(),
            resource_class: parsed.resource_class(),
            board: parsed.board.clone(),
            alias,
            parsed,
        }
    }
}

/// Options of [`ResourceManager::open_resource`].
#[derive(Default)]
pub struct OpenOptions {
    pub access_mode: AccessMode,
    /// How long the open itself may block, in milliseconds.
    pub open_timeout_ms: u32,
    /// Force dispatch to another resource class than the name implies.
    pub resource_class_override: Option<ResourceClass>,
    /// Attributes applied right after the session opens.
    pub attr_overrides: Vec<(AttrId, AttrValue)>,
}

/// Owner of a default-RM session on one backend.
///
/// Safe to share across threads. Two managers opened on the same library
/// path share the loaded library but hold distinct default-RM sessions.
pub struct ResourceManager {
    backend: BackendArc,
    session: Mutex<Option<Session>>,
    resources: Mutex<Vec<Weak<ResourceCore>>>,
    backend_hint: String,
}

impl ResourceManager {
    /// Open a default-RM session on an already-constructed backend.
    pub fn new(backend: BackendArc) -> Result<ResourceManager> {
        let (session, status) = backend.open_default_rm()?;
        log::debug!(
            "default RM session {session} on backend '{}' ({status})",
            backend.name()
        );
        Ok(ResourceManager {
            backend,
            session: Mutex::new(Some(session)),
            resources: Mutex::new(Vec::new()),
            backend_hint: String::new(),
        })
    }

    /// Resolve a library hint (`/path/to/lib`, `/path@ivi`, `@py`) and
    /// open a default-RM session on the selected backend.
    pub fn from_hint(hint: &str) -> Result<ResourceManager> {
        let backend = resolve_backend(hint)?;
        let mut rm = ResourceManager::new(backend)?;
        rm.backend_hint = hint.to_string();
        Ok(rm)
    }

    pub fn backend(&self) -> &BackendArc {
        &self.backend
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The hint this manager was created from, when built via `from_hint`.
    pub fn backend_hint(&self) -> &str {
        &self.backend_hint
    }

    pub fn session(&self) -> Result<Session> {
        self.session.lock().ok_or(Error::InvalidSession)
    }

    /// Discover resources matching the default pattern `?*::INSTR`.
    pub fn list_resources_default(&self) -> Result<Vec<String>> {
        self.list_resources(DEFAULT_FIND_PATTERN)
    }

    /// Discover resources matching a `?`/`*` pattern; names are returned
    /// in canonical form.
    pub fn list_resources(&self, pattern: &str) -> Result<Vec<String>> {
        let session = self.session()?;
        let names = self.backend.list_resources(session, pattern)?;
        Ok(names
            .into_iter()
            .map(|raw| match ResourceName::parse(&raw) {
                Ok(parsed) => parsed.to_string(),
                Err(err) => {
                    log::debug!("keeping unparseable discovered name '{raw}': {err}");
                    raw
                }
            })
            .collect())
    }

    /// Discover resources and return their parsed identities keyed by
    /// canonical name.
    pub fn list_resources_info(&self, pattern: &str) -> Result<HashMap<String, ResourceInfo>> {
        let mut infos = HashMap::new();
        for name in self.list_resources(pattern)? {
            match ResourceName::parse(&name) {
                Ok(parsed) => {
                    let info = ResourceInfo::from_parsed(parsed);
                    infos.insert(info.resource_name.clone(), info);
                }
                Err(err) => log::debug!("skipping unparseable resource '{name}': {err}"),
            }
        }
        Ok(infos)
    }

    /// Parse `name`, open a session and wrap it in the concrete type for
    /// its (interface, class) pair. The resource is tracked and closed by
    /// [`ResourceManager::close`] if still alive then.
    pub fn open_resource(&self, name: &str, options: OpenOptions) -> Result<AnyResource> {
        let rm_session = self.session()?;
        let parsed = ResourceName::parse(name)?;

        // Aliases (device paths, COMn) keep their original spelling toward
        // the backend, which is where they are resolved.
        let open_string = match (&parsed.board, &parsed.kind) {
            (Board::Alias(_), ResourceKind::AsrlInstr) => name.to_string(),
            _ => parsed.to_string(),
        };

        let (session, status) = self.backend.open(
            rm_session,
            &open_string,
            options.access_mode,
            options.open_timeout_ms,
        )?;
        if status.is_warning() {
            log::warn!("{open_string}: open completed with {status}");
        }

        let core = ResourceCore::new(self.backend.clone(), parsed, session);

        for (attr, value) in options.attr_overrides {
            if let Err(err) = core.run("set_attribute", |backend, session| {
                backend.set_attribute(session, attr, value.clone())
            }) {
                let _ = core.close();
                return Err(err);
            }
        }

        {
            let mut resources = self.resources.lock();
            resources.retain(|weak| weak.strong_count() > 0);
            resources.push(Arc::downgrade(&core));
        }

        let resource = dispatch(core, options.resource_class_override);
        if let (InterfaceType::Asrl, Some(message_based)) = (
            resource.core().parsed_name().interface_type(),
            resource.as_message_based(),
        ) {
            // Align the low-level termination character with the serial
            // CR convention; best effort on backends without the attribute.
            if let Err(err) = message_based.set_read_termination("\r") {
                log::debug!(
                    "{}: applying serial termination defaults: {err}",
                    resource.core().canonical_name()
                );
            }
        }
        Ok(resource)
    }

    /// Open a message-based resource or fail with `UnsupportedOperation`.
    pub fn open_message_based(
        &self,
        name: &str,
        options: OpenOptions,
    ) -> Result<AnyResource> {
        let resource = self.open_resource(name, options)?;
        if resource.as_message_based().is_none() {
            let kind = resource.kind_name();
            let _ = resource.core().close();
            return Err(Error::UnsupportedOperation {
                op: "message-based I/O",
                kind,
            });
        }
        Ok(resource)
    }

    /// Snapshot of the currently-open resources created by this manager.
    pub fn list_opened_resources(&self) -> Vec<Arc<ResourceCore>> {
        let mut resources = self.resources.lock();
        resources.retain(|weak| weak.strong_count() > 0);
        resources.iter().filter_map(Weak::upgrade).collect()
    }

    /// Close every tracked resource, then the default-RM session.
    /// Idempotent.
    pub fn close(&self) -> Result<()> {
        let session = match self.session.lock().take() {
            Some(session) => session,
            None => return Ok(()),
        };

        for core in self.list_opened_resources() {
            if let Err(err) = core.close() {
                log::warn!("{}: closing on RM shutdown: {err}", core.canonical_name());
            }
        }
        self.resources.lock().clear();

        let status = self.backend.close(session)?;
        if status.is_warning() {
            log::warn!("closing default RM session completed with {status}");
        }
        Ok(())
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_info_carries_alias() {
        let parsed = ResourceName::parse("ASRL/dev/ttyUSB1::INSTR").unwrap();
        let info = ResourceInfo::from_parsed(parsed);
        assert_eq!(info.alias.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(info.interface_type, InterfaceType::Asrl);
        assert_eq!(info.resource_class, ResourceClass::Instr);

        let parsed = ResourceName::parse("GPIB0::4::INSTR").unwrap();
        let info = ResourceInfo::from_parsed(parsed);
        assert!(info.alias.is_none());
        assert_eq!(info.resource_name, "GPIB0::4::INSTR");
    }
}
