//! Session-identity persistence.
//!
//! One recording run is identified by a (build name, test session id) pair.
//! The pair lives in a single plain-text file so that separate CLI
//! invocations of the same build (record build, record tests, inspect)
//! agree on which server-side session they are talking to.
//!
//! # File format
//!
//! Resolved pair, single line:
//!
//! ```text
//! build=<build name>#test_session=<session id>
//! ```
//!
//! Before a session id is issued, `write_build` stores a provisional JSON
//! record `{"build": "<name>"}`. `read_session` treats that (and anything
//! else that is not the pair format) as malformed, which callers may
//! recover from by registering a fresh session.
//!
//! Writes go through a temp file and rename, so a concurrent reader never
//! observes a torn file. Read-then-write between two processes is still a
//! race; this is a single-operator tool and the conflict checks exist to
//! catch the aftermath, not to prevent it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tempfile::NamedTempFile;

use crate::error::SessionError;

/// Environment variable overriding where the session file lives.
pub const SESSION_DIR_ENV: &str = "LAUNCHABLE_SESSION_DIR";

/// Fixed name of the session file inside the session directory.
pub const SESSION_FILE_NAME: &str = ".launchable";

/// Reads and writes the session-identity file.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Resolve the session directory from `LAUNCHABLE_SESSION_DIR`, falling
    /// back to the current working directory. A leading `~` is expanded.
    pub fn from_env() -> Self {
        let dir = match std::env::var(SESSION_DIR_ENV) {
            Ok(v) if !v.is_empty() => expand_tilde(&v),
            _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        SessionStore { dir }
    }

    /// Use an explicit directory (useful for testing).
    pub fn with_dir(dir: PathBuf) -> Self {
        SessionStore { dir }
    }

    /// Full path of the session file.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE_NAME)
    }

    /// Persist a provisional build record.
    ///
    /// Fails with a conflict if the existing file names a different build.
    pub fn write_build(&self, build_name: &str) -> Result<(), SessionError> {
        self.ensure_dir()?;
        let path = self.file_path();

        if path.exists() {
            let saved = self.read_build()?;
            if saved != build_name {
                return Err(SessionError::BuildConflict {
                    path,
                    requested: build_name.to_string(),
                    saved,
                });
            }
        }

        let record = serde_json::json!({ "build": build_name });
        self.write_atomic(record.to_string().as_bytes())
    }

    /// Read the build name back, from either the provisional record or a
    /// resolved pair.
    pub fn read_build(&self) -> Result<String, SessionError> {
        let path = self.file_path();
        let text = fs::read_to_string(&path)
            .map_err(|e| SessionError::io("read", path.clone(), e))?;

        if let Some(build) = parse_build_record(&text) {
            return Ok(build);
        }
        match parse_session_file(&text) {
            Some((build, _)) => Ok(build),
            None => Err(SessionError::Malformed {
                path,
                content: text,
            }),
        }
    }

    /// Persist the resolved (build, session id) pair.
    ///
    /// Rewriting the identical pair is a no-op; any disagreement with the
    /// existing file is a conflict, reported separately for the build name
    /// and the session id.
    pub fn write_session(&self, build_name: &str, session_id: &str) -> Result<(), SessionError> {
        self.ensure_dir()?;
        let path = self.file_path();

        if path.exists() {
            let text = fs::read_to_string(&path)
                .map_err(|e| SessionError::io("read", path.clone(), e))?;

            if let Some(saved_build) = parse_build_record(&text) {
                if saved_build != build_name {
                    return Err(SessionError::BuildConflict {
                        path,
                        requested: build_name.to_string(),
                        saved: saved_build,
                    });
                }
            } else {
                let (saved_build, saved_id) =
                    parse_session_file(&text).ok_or_else(|| SessionError::Malformed {
                        path: path.clone(),
                        content: text.clone(),
                    })?;
                if saved_build != build_name {
                    return Err(SessionError::BuildConflict {
                        path,
                        requested: build_name.to_string(),
                        saved: saved_build,
                    });
                }
                if saved_id != session_id {
                    return Err(SessionError::SessionConflict {
                        path,
                        requested: session_id.to_string(),
                        saved: saved_id,
                    });
                }
            }
        }

        self.write_atomic(format_session_file(build_name, session_id).as_bytes())
    }

    /// Look up the session id recorded for `build_name`.
    ///
    /// Returns `Ok(None)` when no session file exists. A file written for a
    /// different build is a mismatch error, not a silent miss: recording
    /// into a stale session is exactly what that check prevents.
    pub fn read_session(&self, build_name: &str) -> Result<Option<String>, SessionError> {
        let path = self.file_path();
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::io("read", path, e)),
        };

        let (saved_build, session_id) =
            parse_session_file(&text).ok_or_else(|| SessionError::Malformed {
                path: path.clone(),
                content: text.clone(),
            })?;

        if saved_build != build_name {
            return Err(SessionError::BuildMismatch {
                path,
                requested: build_name.to_string(),
                saved: saved_build,
            });
        }

        Ok(Some(session_id))
    }

    /// Read whatever resolved pair is on disk, without a build-name check.
    /// Used by `inspect` when the user gave no explicit session id.
    pub fn read_current(&self) -> Result<Option<(String, String)>, SessionError> {
        let path = self.file_path();
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::io("read", path, e)),
        };

        parse_session_file(&text)
            .map(Some)
            .ok_or(SessionError::Malformed {
                path,
                content: text,
            })
    }

    /// Delete the session file. Idempotent: a missing file is not an error.
    pub fn remove_session(&self) -> Result<(), SessionError> {
        let path = self.file_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::io("remove", path, e)),
        }
    }

    /// Delete every file in the session directory whose mtime is older than
    /// `now - days_ago`. Called at the start of a new recording run so
    /// leftovers from abandoned builds do not accumulate.
    ///
    /// A missing directory is a no-op. Windows gets a small tolerance in the
    /// cutoff because file deletion there sometimes lags the clock.
    pub fn clean_session_files(&self, days_ago: i64) -> Result<(), SessionError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SessionError::io("read", self.dir.clone(), e)),
        };

        let skew = if cfg!(windows) {
            Duration::microseconds(10)
        } else {
            Duration::zero()
        };
        let cutoff = Utc::now() - Duration::days(days_ago) + skew;

        for entry in entries {
            let entry = entry.map_err(|e| SessionError::io("read", self.dir.clone(), e))?;
            let path = entry.path();

            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let modified: DateTime<Utc> = modified.into();

            if modified < cutoff {
                tracing::debug!(path = %path.display(), "removing expired session file");
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(SessionError::io("remove", path, e)),
                }
            }
        }

        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir).map_err(|e| SessionError::io("create", self.dir.clone(), e))
    }

    fn write_atomic(&self, contents: &[u8]) -> Result<(), SessionError> {
        let path = self.file_path();
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| SessionError::io("write to", path.clone(), e))?;
        tmp.write_all(contents)
            .map_err(|e| SessionError::io("write to", path.clone(), e))?;
        tmp.persist(&path)
            .map_err(|e| SessionError::io("write to", path, e.error))?;
        Ok(())
    }
}

/// Format the resolved pair for the session file.
pub fn format_session_file(build_name: &str, session_id: &str) -> String {
    format!("build={}#test_session={}", build_name, session_id)
}

/// Parse the `build=<name>#test_session=<id>` pair. Strict: exactly one
/// `#`, one `=` per side, no empty segments.
fn parse_session_file(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    let segments: Vec<&str> = text.split('#').collect();
    let [build_part, session_part] = segments.as_slice() else {
        return None;
    };

    let build = split_pair(build_part)?;
    let session = split_pair(session_part)?;
    Some((build, session))
}

fn split_pair(segment: &str) -> Option<String> {
    let parts: Vec<&str> = segment.split('=').collect();
    match parts.as_slice() {
        [key, value] if !key.is_empty() && !value.is_empty() => Some(value.to_string()),
        _ => None,
    }
}

/// Parse a provisional `{"build": "<name>"}` record.
fn parse_build_record(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value.get("build")?.as_str().map(|s| s.to_string())
}

/// Format the session name consumed by other commands:
/// `builds/<build>/test_sessions/<id>`.
pub fn format_session_name(build_name: &str, session_id: &str) -> String {
    format!("builds/{}/test_sessions/{}", build_name, session_id)
}

/// Split a session name into its build name and session id, by position.
pub fn parse_session_name(name: &str) -> Result<(String, String), SessionError> {
    let parts: Vec<&str> = name.split('/').collect();
    match parts.as_slice() {
        [_, build, _, id] if !build.is_empty() && !id.is_empty() => {
            Ok((build.to_string(), id.to_string()))
        }
        _ => Err(SessionError::MalformedName(name.to_string())),
    }
}

/// Expand a leading `~` or `~/` to the invoking user's home directory.
/// A `~user` prefix names some other account's home, which has no
/// portable lookup, so such paths pass through untouched.
fn expand_tilde(path: &str) -> PathBuf {
    match dirs::home_dir() {
        Some(home) if path == "~" => home,
        Some(home) => match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
            Some(rest) => home.join(rest),
            None => Path::new(path).to_path_buf(),
        },
        None => Path::new(path).to_path_buf(),
    }
}
