//! Structured failure descriptors handed to the classifier.
//!
//! Collaborators never pass error messages to the retry policy; they pass a
//! tagged code. Classification works on the tag only, so it stays
//! deterministic and locale-independent.

use std::fmt;
use std::io;

/// Application token used by cache refresh when the source is older than the cache.
pub const STALE_SOURCE: &str = "stale-source";

/// Application token for requests that can never be sent as built (e.g. malformed URL).
pub const INVALID_REQUEST: &str = "invalid-request";

/// System-level failure codes produced by filesystem and socket collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemCode {
    PermissionDenied,
    NotFound,
    /// Resource busy (EBUSY, ETXTBSY).
    Busy,
    /// Process or system handle table exhausted (EMFILE, ENFILE).
    TooManyOpenFiles,
    TimedOut,
    ConnectionReset,
    ConnectionRefused,
    /// DNS failure or no route to host.
    HostUnreachable,
    Interrupted,
    WouldBlock,
    /// Raw OS error we have no name for.
    Os(i32),
    /// No OS error code available at all.
    Other,
}

impl SystemCode {
    /// Stable token used in policy code sets and logs.
    pub fn token(&self) -> String {
        match self {
            SystemCode::PermissionDenied => "permission-denied".to_string(),
            SystemCode::NotFound => "not-found".to_string(),
            SystemCode::Busy => "busy".to_string(),
            SystemCode::TooManyOpenFiles => "too-many-open-files".to_string(),
            SystemCode::TimedOut => "timed-out".to_string(),
            SystemCode::ConnectionReset => "connection-reset".to_string(),
            SystemCode::ConnectionRefused => "connection-refused".to_string(),
            SystemCode::HostUnreachable => "host-unreachable".to_string(),
            SystemCode::Interrupted => "interrupted".to_string(),
            SystemCode::WouldBlock => "would-block".to_string(),
            SystemCode::Os(code) => format!("os-error-{code}"),
            SystemCode::Other => "system-other".to_string(),
        }
    }

    /// Map an I/O error to a system code.
    ///
    /// The raw OS error wins when present (it distinguishes EBUSY and EMFILE,
    /// which `io::ErrorKind` folds into `Other` on older toolchains); otherwise
    /// the error kind is used.
    pub fn from_io(err: &io::Error) -> Self {
        if let Some(raw) = err.raw_os_error() {
            if let Some(code) = Self::from_raw_os(raw) {
                return code;
            }
        }
        match err.kind() {
            io::ErrorKind::PermissionDenied => SystemCode::PermissionDenied,
            io::ErrorKind::NotFound => SystemCode::NotFound,
            io::ErrorKind::TimedOut => SystemCode::TimedOut,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                SystemCode::ConnectionReset
            }
            io::ErrorKind::ConnectionRefused => SystemCode::ConnectionRefused,
            io::ErrorKind::Interrupted => SystemCode::Interrupted,
            io::ErrorKind::WouldBlock => SystemCode::WouldBlock,
            _ => match err.raw_os_error() {
                Some(raw) => SystemCode::Os(raw),
                None => SystemCode::Other,
            },
        }
    }

    #[cfg(unix)]
    fn from_raw_os(raw: i32) -> Option<Self> {
        let code = match raw {
            libc::EACCES | libc::EPERM => SystemCode::PermissionDenied,
            libc::ENOENT => SystemCode::NotFound,
            libc::EBUSY | libc::ETXTBSY => SystemCode::Busy,
            libc::EMFILE | libc::ENFILE => SystemCode::TooManyOpenFiles,
            libc::ETIMEDOUT => SystemCode::TimedOut,
            libc::ECONNRESET | libc::ECONNABORTED | libc::EPIPE => SystemCode::ConnectionReset,
            libc::ECONNREFUSED => SystemCode::ConnectionRefused,
            libc::EHOSTUNREACH | libc::ENETUNREACH => SystemCode::HostUnreachable,
            libc::EINTR => SystemCode::Interrupted,
            libc::EAGAIN => SystemCode::WouldBlock,
            _ => return None,
        };
        Some(code)
    }

    #[cfg(not(unix))]
    fn from_raw_os(_raw: i32) -> Option<Self> {
        None
    }
}

/// Tagged failure shape shared by every wrapped subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureDescriptor {
    /// Filesystem or socket error.
    System(SystemCode),
    /// Completed HTTP exchange with a non-success status.
    Http(u16),
    /// Application-defined token (e.g. [`STALE_SOURCE`]).
    App(String),
}

impl FailureDescriptor {
    pub fn app(token: impl Into<String>) -> Self {
        FailureDescriptor::App(token.into())
    }

    /// Token matched against `retryable_codes` / `non_retryable_codes`.
    ///
    /// System codes use their kebab-case name, HTTP statuses `http-<status>`,
    /// application tokens are used verbatim.
    pub fn token(&self) -> String {
        match self {
            FailureDescriptor::System(code) => code.token(),
            FailureDescriptor::Http(status) => format!("http-{status}"),
            FailureDescriptor::App(token) => token.clone(),
        }
    }
}

impl fmt::Display for FailureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl std::error::Error for FailureDescriptor {}

impl From<&io::Error> for FailureDescriptor {
    fn from(err: &io::Error) -> Self {
        FailureDescriptor::System(SystemCode::from_io(err))
    }
}

/// Errors that can describe themselves to the classifier.
///
/// The executor keeps the original error value and only asks it for a
/// descriptor, so diagnostics survive the retry loop untouched.
pub trait Describe {
    fn describe(&self) -> FailureDescriptor;
}

impl Describe for FailureDescriptor {
    fn describe(&self) -> FailureDescriptor {
        self.clone()
    }
}

impl Describe for io::Error {
    fn describe(&self) -> FailureDescriptor {
        FailureDescriptor::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_stable() {
        assert_eq!(FailureDescriptor::System(SystemCode::PermissionDenied).token(), "permission-denied");
        assert_eq!(FailureDescriptor::System(SystemCode::Os(77)).token(), "os-error-77");
        assert_eq!(FailureDescriptor::Http(404).token(), "http-404");
        assert_eq!(FailureDescriptor::app(STALE_SOURCE).token(), "stale-source");
    }

    #[test]
    fn io_kind_maps_without_raw_code() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(SystemCode::from_io(&err), SystemCode::PermissionDenied);
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(SystemCode::from_io(&err), SystemCode::ConnectionReset);
        let err = io::Error::new(io::ErrorKind::InvalidData, "bad");
        assert_eq!(SystemCode::from_io(&err), SystemCode::Other);
    }

    #[cfg(unix)]
    #[test]
    fn raw_os_codes_take_precedence() {
        let err = io::Error::from_raw_os_error(libc::EBUSY);
        assert_eq!(SystemCode::from_io(&err), SystemCode::Busy);
        let err = io::Error::from_raw_os_error(libc::EMFILE);
        assert_eq!(SystemCode::from_io(&err), SystemCode::TooManyOpenFiles);
        let err = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(err.describe(), FailureDescriptor::System(SystemCode::NotFound));
    }

    #[test]
    fn message_does_not_affect_descriptor() {
        let a = io::Error::new(io::ErrorKind::NotFound, "missing file");
        let b = io::Error::new(io::ErrorKind::NotFound, "datei fehlt");
        assert_eq!(a.describe(), b.describe());
    }
}
