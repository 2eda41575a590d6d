//! Endpoint-address connection identifier.
//!
//! [`ConnectionKey`] is a newtype wrapper around [`String`] holding the
//! endpoint address a connection was opened for. It is assigned once at
//! connection creation time and immutable for the handle's lifetime.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a registered connection.
///
/// Wraps the connection's endpoint address. Used as the dictionary key in
/// [`super::ConnectionRegistry`], as the multicast exclusion discriminator,
/// and as the correlation field in lifecycle events. An empty key is legal
/// to construct but is never inserted into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    /// Creates a `ConnectionKey` from any string-like address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the key is empty. Empty keys are rejected by
    /// [`super::ConnectionRegistry::register`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionKey {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl From<&str> for ConnectionKey {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

impl From<ConnectionKey> for String {
    fn from(key: ConnectionKey) -> Self {
        key.0
    }
}

// Enables `HashMap<ConnectionKey, _>` lookups by `&str`.
impl Borrow<str> for ConnectionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
