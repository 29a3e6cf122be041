//! Ingest service credential
//!
//! Resolved once per run in `main` and handed to the API client. The value
//! lives only in memory; nothing here writes it back to disk.

use crate::error::Result;
use qingest_common::IngestError;
use std::fmt;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the auth file
pub const DEFAULT_AUTH_PATH: &str = "~/.lsst/qserv";

/// Opaque secret sent as `auth_key`
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

pub struct CredentialResolver {
    auth_path: PathBuf,
    interactive: bool,
}

impl CredentialResolver {
    pub fn new(auth_path: &str) -> Self {
        Self {
            auth_path: expand_tilde(auth_path),
            interactive: true,
        }
    }

    /// Allow or forbid the terminal prompt fallback
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn auth_path(&self) -> &Path {
        &self.auth_path
    }

    /// Read the auth file, falling back to a hidden prompt on a terminal
    pub fn resolve(&self) -> Result<Credential> {
        match std::fs::read_to_string(&self.auth_path) {
            Ok(content) => {
                let value = content.trim();
                if value.is_empty() {
                    return Err(IngestError::CredentialUnavailable(format!(
                        "auth file '{}' is empty",
                        self.auth_path.display()
                    ))
                    .into());
                }
                debug!(path = %self.auth_path.display(), "Read credential from auth file");
                Ok(Credential::new(value))
            },
            Err(e) => {
                debug!(path = %self.auth_path.display(), error = %e, "No usable auth file");
                self.prompt()
            },
        }
    }

    fn prompt(&self) -> Result<Credential> {
        if !self.interactive || !std::io::stdin().is_terminal() {
            return Err(IngestError::CredentialUnavailable(format!(
                "no auth file at '{}' and no terminal to prompt on",
                self.auth_path.display()
            ))
            .into());
        }

        let value = inquire::Password::new("Ingest service credential:")
            .without_confirmation()
            .with_display_mode(inquire::PasswordDisplayMode::Hidden)
            .prompt()
            .map_err(|e| IngestError::CredentialUnavailable(format!("prompt failed: {}", e)))?;

        if value.trim().is_empty() {
            return Err(IngestError::CredentialUnavailable("empty credential entered".to_string()).into());
        }
        Ok(Credential::new(value.trim()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use tempfile::TempDir;

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("top-secret");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.expose(), "top-secret");
    }

    #[test]
    fn test_reads_trimmed_auth_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qserv");
        std::fs::write(&path, "  abc123\n").unwrap();

        let credential = CredentialResolver::new(path.to_str().unwrap())
            .interactive(false)
            .resolve()
            .unwrap();
        assert_eq!(credential.expose(), "abc123");
    }

    #[test]
    fn test_missing_file_without_prompt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent");

        let err = CredentialResolver::new(path.to_str().unwrap())
            .interactive(false)
            .resolve()
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::Ingest(IngestError::CredentialUnavailable(_))
        ));
    }

    #[test]
    fn test_empty_auth_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qserv");
        std::fs::write(&path, "\n").unwrap();

        assert!(CredentialResolver::new(path.to_str().unwrap())
            .interactive(false)
            .resolve()
            .is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/.lsst/qserv");
        assert!(expanded.ends_with(".lsst/qserv"));
        assert!(!expanded.to_string_lossy().starts_with('~') || dirs::home_dir().is_none());
        assert_eq!(expand_tilde("/etc/qserv"), PathBuf::from("/etc/qserv"));
    }
}
