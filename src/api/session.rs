//! Purpose: Persisted map of server URLs to previously-used connection
//! parameters.
//! Exports: `SessionStore`, `SessionEntry`.
//! Role: CLI convenience; the cache core never reads this file.
//! Invariants: Passwords are never written to disk.
//! Invariants: A missing file reads as an empty store.

use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::session_paths::{default_session_dir, session_file_path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SessionEntry {
    pub database: String,
    pub username: String,
    pub saved_at: String,
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn open_default() -> Self {
        Self {
            path: session_file_path(&default_session_dir()),
        }
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> ApiResult<BTreeMap<String, SessionEntry>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message(format!(
                        "failed to read session file {}",
                        self.path.display()
                    ))
                    .with_source(err));
            }
        };
        serde_json::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!(
                    "session file {} is not valid JSON",
                    self.path.display()
                ))
                .with_source(err)
        })
    }

    pub fn lookup(&self, url: &str) -> ApiResult<Option<SessionEntry>> {
        Ok(self.load()?.remove(url))
    }

    pub fn save(&self, url: &str, database: &str, username: &str) -> ApiResult<()> {
        let mut sessions = self.load()?;
        let saved_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to format session timestamp")
                    .with_source(err)
            })?;
        sessions.insert(
            url.to_string(),
            SessionEntry {
                database: database.to_string(),
                username: username.to_string(),
                saved_at,
            },
        );
        self.persist(&sessions)
    }

    pub fn remove(&self, url: &str) -> ApiResult<bool> {
        let mut sessions = self.load()?;
        let removed = sessions.remove(url).is_some();
        if removed {
            self.persist(&sessions)?;
        }
        Ok(removed)
    }

    fn persist(&self, sessions: &BTreeMap<String, SessionEntry>) -> ApiResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message(format!(
                        "failed to create session directory {}",
                        parent.display()
                    ))
                    .with_source(err)
            })?;
        }
        let text = serde_json::to_string_pretty(sessions).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to encode session file")
                .with_source(err)
        })?;
        std::fs::write(&self.path, text).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!(
                    "failed to write session file {}",
                    self.path.display()
                ))
                .with_source(err)
        })
    }
}
