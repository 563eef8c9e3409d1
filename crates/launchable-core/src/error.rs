use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the session-file store.
///
/// Conflict variants carry both sides of the disagreement so the CLI can
/// print exactly what is stored versus what was requested.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(
        "session file {file} already records build '{saved}', not '{requested}'; \
         confirm the previous run finished and remove {file} before retrying",
        file = .path.display()
    )]
    BuildConflict {
        path: PathBuf,
        requested: String,
        saved: String,
    },

    #[error(
        "session file {file} already records test session '{saved}', not '{requested}'; \
         confirm the previous run finished and remove {file} before retrying",
        file = .path.display()
    )]
    SessionConflict {
        path: PathBuf,
        requested: String,
        saved: String,
    },

    #[error(
        "session file {file} belongs to build '{saved}', not '{requested}'; \
         the previous job may have failed. Remove {file} and retry",
        file = .path.display()
    )]
    BuildMismatch {
        path: PathBuf,
        requested: String,
        saved: String,
    },

    #[error("can't parse session file {file}: {content:?}", file = .path.display())]
    Malformed { path: PathBuf, content: String },

    #[error("can't parse session '{0}': expected builds/<build>/test_sessions/<id>")]
    MalformedName(String),

    #[error(
        "can't {action} {file}: {source}. Perhaps set the LAUNCHABLE_SESSION_DIR \
         environment variable to an alternative writable path",
        file = .path.display()
    )]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    pub(crate) fn io(action: &'static str, path: PathBuf, source: std::io::Error) -> Self {
        SessionError::Io {
            action,
            path,
            source,
        }
    }
}
