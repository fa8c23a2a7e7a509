//! Backend selection.
//!
//! A library hint may carry a trailing `@<name>` selector, e.g.
//! `/opt/ni/libvisa.so@ivi` or `@py`. The name refers to a registered
//! backend factory; the default `ivi` maps to the foreign-library binding.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::backend::{library::VisaLibrary, BackendArc};
use crate::error::{Error, Result};

/// Name of the built-in shared-library binding.
pub const DEFAULT_BACKEND: &str = "ivi";

/// Builds a backend from the path part of the hint (possibly empty).
pub type BackendFactory = Box<dyn Fn(&str) -> Result<BackendArc> + Send + Sync>;

static REGISTRY: Lazy<RwLock<HashMap<String, BackendFactory>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a backend under `name`. Re-registering replaces the factory.
pub fn register_backend(name: &str, factory: BackendFactory) {
    REGISTRY.write().insert(name.to_string(), factory);
}

fn is_backend_name(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Split a hint into its path part and backend name. Only a trailing
/// `@token` of word characters is treated as a selector, so paths that
/// merely contain `@` stay intact.
pub fn split_backend_hint(hint: &str) -> (&str, &str) {
    if let Some((path, name)) = hint.rsplit_once('@') {
        if is_backend_name(name) {
            return (path, name);
        }
    }
    (hint, DEFAULT_BACKEND)
}

/// Resolve a hint into a live backend.
pub fn resolve_backend(hint: &str) -> Result<BackendArc> {
    let (path, name) = split_backend_hint(hint);

    if name == DEFAULT_BACKEND {
        let library: BackendArc = VisaLibrary::get_or_load(path)?;
        return Ok(library);
    }

    let registry = REGISTRY.read();
    match registry.get(name) {
        Some(factory) => factory(path),
        None => Err(Error::Library {
            path: hint.to_string(),
            reason: format!("no backend registered under '{name}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_splitting() {
        assert_eq!(split_backend_hint("/usr/lib/libvisa.so@ivi"), ("/usr/lib/libvisa.so", "ivi"));
        assert_eq!(split_backend_hint("@py"), ("", "py"));
        assert_eq!(split_backend_hint("@my_backend"), ("", "my_backend"));
        assert_eq!(split_backend_hint("/plain/path.so"), ("/plain/path.so", "ivi"));
        // An '@' that is not followed by a word token belongs to the path.
        assert_eq!(split_backend_hint("/odd/p@th/lib.so"), ("/odd/p@th/lib.so", "ivi"));
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let err = resolve_backend("@no_such_backend").unwrap_err();
        assert!(matches!(err, Error::Library { .. }));
    }
}
