// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolving the server endpoint.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::Error;
use crate::settings::{AppSettings, Settings};

/// Username and password for a server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Network address of a transport server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Credentials, if the server needs them.
    pub credentials: Option<Credentials>,
}

impl Endpoint {
    fn from_settings(settings: &AppSettings) -> Option<Self> {
        let host = settings.address.as_deref().filter(|h| !h.is_empty())?;
        let port = settings.port?;
        let credentials = settings
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|username| Credentials {
                username: username.to_string(),
                password: settings.password.clone().unwrap_or_default(),
            });
        Some(Self {
            host: host.to_string(),
            port,
            credentials,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A service advertisement carrying the server address in its TXT record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisedRecord {
    txt: HashMap<String, String>,
}

impl AdvertisedRecord {
    /// Creates a record from TXT key/value pairs.
    pub fn from_txt<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            txt: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns a TXT value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.txt.get(key).map(String::as_str)
    }

    /// Returns the advertised `ip` and `port`, if both are present and valid.
    #[must_use]
    pub fn address(&self) -> Option<(String, u16)> {
        let ip = self.get("ip").filter(|ip| !ip.is_empty())?;
        let port = self.get("port")?.trim().parse().ok()?;
        Some((ip.to_string(), port))
    }
}

/// Resolves and caches the server endpoint.
///
/// Persisted settings win when both host and port are known. Otherwise an
/// advertised record is used and written back to the settings so the next
/// start does not need it. The resolved endpoint is cached until the settings
/// change or [`invalidate`](Self::invalidate) is called.
#[derive(Debug)]
pub struct EndpointResolver {
    settings: Settings,
    changes: Mutex<watch::Receiver<AppSettings>>,
    cached: Mutex<Option<Endpoint>>,
}

impl EndpointResolver {
    /// Creates a resolver over `settings`.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        let changes = Mutex::new(settings.subscribe());
        Self {
            settings,
            changes,
            cached: Mutex::new(None),
        }
    }

    /// Returns the settings handle.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolves the endpoint.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnresolvedEndpoint` if neither the settings nor
    /// `advertised` provide a host and port, or `Error::Settings` if an
    /// advertised address cannot be persisted.
    pub fn resolve(&self, advertised: Option<&AdvertisedRecord>) -> Result<Endpoint, Error> {
        if self.settings_changed() {
            self.invalidate();
        }
        if let Some(endpoint) = self.cached.lock().clone() {
            return Ok(endpoint);
        }

        let endpoint = match Endpoint::from_settings(&self.settings.get()) {
            Some(endpoint) => {
                tracing::debug!(endpoint = %endpoint, "Endpoint from settings");
                endpoint
            }
            None => self.resolve_advertised(advertised)?,
        };
        *self.cached.lock() = Some(endpoint.clone());
        Ok(endpoint)
    }

    /// Drops the cached endpoint so the next resolve reads the settings again.
    pub fn invalidate(&self) {
        if self.cached.lock().take().is_some() {
            tracing::debug!("Endpoint cache invalidated");
        }
    }

    fn settings_changed(&self) -> bool {
        let mut changes = self.changes.lock();
        let changed = changes.has_changed().unwrap_or(false);
        if changed {
            changes.mark_unchanged();
        }
        changed
    }

    fn resolve_advertised(&self, advertised: Option<&AdvertisedRecord>) -> Result<Endpoint, Error> {
        let Some((host, port)) = advertised.and_then(AdvertisedRecord::address) else {
            return Err(Error::UnresolvedEndpoint(
                "no address and port in settings and no usable advertisement".to_string(),
            ));
        };
        tracing::info!(host = %host, port, "Using advertised endpoint");
        self.settings.update(|s| {
            s.address = Some(host.clone());
            s.port = Some(port);
        })?;
        // our own write is not a change to react to
        self.changes.lock().mark_unchanged();
        Endpoint::from_settings(&self.settings.get()).ok_or_else(|| {
            Error::UnresolvedEndpoint("advertised address was not persisted".to_string())
        })
    }
}
