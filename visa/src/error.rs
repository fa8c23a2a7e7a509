//! Error surface of the crate.
//!
//! Backend calls report a [`StatusCode`]; error-class codes are mapped to a
//! variant here, warning-class codes are recorded on the resource and logged
//! without failing the operation.

use thiserror::Error;

use crate::constants::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed resource name.
    #[error("invalid resource name at offset {pos}: {reason}")]
    Parse { pos: usize, reason: String },

    /// Operation on a closed or never-opened session.
    #[error("invalid session: resource is closed")]
    InvalidSession,

    /// A blocking operation exceeded its deadline.
    #[error("{op} timed out after {timeout_ms}ms")]
    Timeout { op: &'static str, timeout_ms: u32 },

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("resource busy or locked: {0}")]
    ResourceBusy(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Generic backend-status failure.
    #[error("{op} failed with {status}")]
    Io { status: StatusCode, op: &'static str },

    /// Malformed framing: missing block sentinel, bad length digits,
    /// declared-length mismatch or double termination.
    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    /// Capability absent on this resource kind or backend.
    #[error("operation {op} not supported on {kind}")]
    UnsupportedOperation { op: &'static str, kind: &'static str },

    /// Text read could not be decoded.
    #[error("cannot decode response as {encoding} at byte {offset}")]
    Encoding { encoding: &'static str, offset: usize },

    /// An event handler panicked; caught at the dispatch boundary.
    #[error("event handler failed: {0}")]
    Handler(String),

    /// The backend shared library could not be loaded or is incomplete.
    #[error("visa library {path}: {reason}")]
    Library { path: String, reason: String },
}

impl Error {
    /// Map an error-class status to its variant. `context` names the
    /// resource or object the operation addressed.
    pub fn from_status(status: StatusCode, op: &'static str, context: &str) -> Error {
        match status {
            StatusCode::ERROR_INV_OBJECT => Error::InvalidSession,
            StatusCode::ERROR_TMO => Error::Timeout { op, timeout_ms: 0 },
            StatusCode::ERROR_RSRC_NFOUND | StatusCode::ERROR_INV_RSRC_NAME => {
                Error::ResourceNotFound(context.to_string())
            }
            StatusCode::ERROR_RSRC_LOCKED
            | StatusCode::ERROR_RSRC_BUSY
            | StatusCode::ERROR_SESN_NLOCKED => Error::ResourceBusy(context.to_string()),
            StatusCode::ERROR_NPERMISSION | StatusCode::ERROR_INV_ACC_MODE => {
                Error::AccessDenied(context.to_string())
            }
            StatusCode::ERROR_NSUP_OPER | StatusCode::ERROR_NIMPL_OPER => {
                Error::UnsupportedOperation { op, kind: "backend" }
            }
            other => Error::Io { status: other, op },
        }
    }

    /// Status carried by this error, if it originated from a backend call.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Io { status, .. } => Some(*status),
            Error::InvalidSession => Some(StatusCode::ERROR_INV_OBJECT),
            Error::Timeout { .. } => Some(StatusCode::ERROR_TMO),
            Error::ResourceNotFound(_) => Some(StatusCode::ERROR_RSRC_NFOUND),
            Error::ResourceBusy(_) => Some(StatusCode::ERROR_RSRC_LOCKED),
            Error::AccessDenied(_) => Some(StatusCode::ERROR_NPERMISSION),
            Error::UnsupportedOperation { .. } => Some(StatusCode::ERROR_NSUP_OPER),
            _ => None,
        }
    }

    /// Attach the timeout that was in force when the operation timed out.
    pub fn with_timeout(self, timeout_ms: u32) -> Error {
        match self {
            Error::Timeout { op, .. } => Error::Timeout { op, timeout_ms },
            other => other,
        }
    }

    pub(crate) fn parse(pos: usize, reason: impl Into<String>) -> Error {
        Error::Parse {
            pos,
            reason: reason.into(),
        }
    }

    pub(crate) fn protocol(reason: impl Into<String>) -> Error {
        Error::Protocol {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let err = Error::from_status(StatusCode::ERROR_INV_OBJECT, "read", "GPIB0::5::INSTR");
        assert!(matches!(err, Error::InvalidSession));

        let err = Error::from_status(StatusCode::ERROR_RSRC_NFOUND, "open", "GPIB0::5::INSTR");
        assert!(matches!(err, Error::ResourceNotFound(name) if name == "GPIB0::5::INSTR"));

        let err = Error::from_status(StatusCode::ERROR_IO, "write", "x");
        assert!(matches!(
            err,
            Error::Io {
                status: StatusCode::ERROR_IO,
                op: "write"
            }
        ));
    }

    #[test]
    fn timeout_carries_deadline() {
        let err = Error::from_status(StatusCode::ERROR_TMO, "read", "x").with_timeout(250);
        assert!(matches!(
            err,
            Error::Timeout {
                op: "read",
                timeout_ms: 250
            }
        ));
    }
}
