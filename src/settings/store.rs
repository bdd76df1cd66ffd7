// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server-level settings and their persistence.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Error;

/// Connection settings shared by every device of a driver.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Server host name or IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Server port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Username, if the server requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password, if the server requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSettings")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where [`AppSettings`] live between runs.
pub trait SettingsStore: Send + Sync + 'static {
    /// Reads the stored settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Settings` if the backing storage cannot be read.
    fn load(&self) -> Result<AppSettings, Error>;

    /// Replaces the stored settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Settings` if the backing storage cannot be written.
    fn save(&self, settings: &AppSettings) -> Result<(), Error>;
}

/// In-memory store, for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: Mutex<AppSettings>,
}

impl MemoryStore {
    /// Creates a store holding `settings`.
    #[must_use]
    pub fn new(settings: AppSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<AppSettings, Error> {
        Ok(self.settings.lock().clone())
    }

    fn save(&self, settings: &AppSettings) -> Result<(), Error> {
        *self.settings.lock() = settings.clone();
        Ok(())
    }
}

/// Pretty-printed JSON file. A missing file reads as defaults.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<AppSettings, Error> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No settings file, using defaults");
                return Ok(AppSettings::default());
            }
            Err(e) => {
                return Err(Error::Settings(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| Error::Settings(format!("invalid {}: {e}", self.path.display())))
    }

    fn save(&self, settings: &AppSettings) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| Error::Settings(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| {
            Error::Settings(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

/// Owned handle to the server-level settings.
///
/// Cloning is cheap; all clones share the store. Every successful
/// [`update`](Self::update) notifies the receivers returned by
/// [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn SettingsStore>,
    current: Arc<watch::Sender<AppSettings>>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("current", &*self.current.borrow())
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Loads the settings from `store`.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    pub fn load(store: impl SettingsStore) -> Result<Self, Error> {
        let initial = store.load()?;
        let (current, _) = watch::channel(initial);
        Ok(Self {
            store: Arc::new(store),
            current: Arc::new(current),
        })
    }

    /// Creates in-memory settings.
    #[must_use]
    pub fn in_memory(settings: AppSettings) -> Self {
        let (current, _) = watch::channel(settings.clone());
        Self {
            store: Arc::new(MemoryStore::new(settings)),
            current: Arc::new(current),
        }
    }

    /// Returns the current settings.
    #[must_use]
    pub fn get(&self) -> AppSettings {
        self.current.borrow().clone()
    }

    /// Modifies, persists and publishes the settings.
    ///
    /// Nothing is published if `change` leaves the settings as they were.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written; the in-memory value is
    /// left unchanged in that case.
    pub fn update(&self, change: impl FnOnce(&mut AppSettings)) -> Result<(), Error> {
        let mut next = self.get();
        change(&mut next);
        if next == *self.current.borrow() {
            return Ok(());
        }
        self.store.save(&next)?;
        tracing::info!(address = ?next.address, port = ?next.port, "Settings updated");
        self.current.send_replace(next);
        Ok(())
    }

    /// Returns a receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppSettings> {
        self.current.subscribe()
    }
}
