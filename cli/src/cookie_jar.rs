//! Persists the session between runs as a single cookie line.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use todo_client_core::Session;

#[derive(Debug, Error)]
#[error("cookie jar {}: {source}", .path.display())]
pub struct JarError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

#[derive(Debug, Clone)]
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty session.
    pub fn load(&self) -> Result<Session, JarError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Session::from_cookie_header(contents.trim())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Session::new()),
            Err(source) => Err(self.error(source)),
        }
    }

    /// Writes the session cookie, or an already-expired one when logged out.
    pub fn save(&self, session: &Session) -> Result<(), JarError> {
        let line = session
            .set_cookie()
            .unwrap_or_else(Session::expire_cookie);
        fs::write(&self.path, format!("{line}\n")).map_err(|source| self.error(source))?;
        tracing::debug!(path = %self.path.display(), authenticated = session.is_authenticated(), "saved cookie jar");
        Ok(())
    }

    fn error(&self, source: io::Error) -> JarError {
        JarError {
            path: self.path.clone(),
            source,
        }
    }
}
