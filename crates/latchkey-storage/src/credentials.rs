//! Persisted WiFi credentials.
//!
//! The camera node keeps its network credentials on local flash in a
//! two-line `key=value` file so they survive power cycles and can be
//! rewritten from the debug shell. The file is rewritten wholesale on save;
//! there is no partial update.

use std::path::Path;

use tracing::debug;

use latchkey_core::{Error, Result};

/// WiFi network credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

impl WifiCredentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    /// Load credentials from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file is missing and
    /// [`Error::Config`] when either line is absent or malformed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;

        let mut ssid = None;
        let mut password = None;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(value) = line.strip_prefix("ssid=") {
                ssid = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("password=") {
                password = Some(value.to_string());
            } else {
                return Err(Error::Config(format!(
                    "unrecognized line in {}: {line:?}",
                    path.display()
                )));
            }
        }

        match (ssid, password) {
            (Some(ssid), Some(password)) if !ssid.is_empty() => {
                debug!(path = %path.display(), "credentials loaded");
                Ok(Self { ssid, password })
            }
            _ => Err(Error::Config(format!(
                "incomplete credentials in {}",
                path.display()
            ))),
        }
    }

    /// Write the credentials to `path`, replacing any existing file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = format!("ssid={}\npassword={}\n", self.ssid, self.password);
        tokio::fs::write(path, contents).await?;
        debug!(path = %path.display(), "credentials saved");
        Ok(())
    }

    /// Remove the credential file. Missing file is not an error.
    pub async fn clear(path: impl AsRef<Path>) -> Result<()> {
        match tokio::fs::remove_file(path.as_ref()).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
