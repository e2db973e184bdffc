//! Server-side presence tracking.
//!
//! In-memory map from identity to the live connection bound to it, plus a
//! reverse index so a disconnect (which carries only the connection) removes
//! its entry in O(1). One mutex guards both maps so they never disagree.

use axum::{extract::State, Json};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::auth::middleware::Claims;
use crate::state::AppState;
use crate::ws::{ConnectionHandle, ConnectionId};

#[derive(Debug, Default)]
struct Entries {
    by_identity: HashMap<String, ConnectionHandle>,
    by_connection: HashMap<ConnectionId, String>,
}

impl Entries {
    fn bind(&mut self, identity: &str, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        if let Some(previous_identity) = self
            .by_connection
            .insert(handle.id(), identity.to_string())
        {
            if previous_identity != identity {
                self.by_identity.remove(&previous_identity);
            }
        }

        match self.by_identity.insert(identity.to_string(), handle.clone()) {
            Some(displaced) if displaced != handle => {
                self.by_connection.remove(&displaced.id());
                Some(displaced)
            }
            _ => None,
        }
    }
}

/// Registry of which identity is reachable through which connection.
/// At most one connection per identity and one identity per connection.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: Mutex<Entries>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `identity` to `handle`, overwriting any existing binding.
    ///
    /// Returns the previously bound connection when it differs from `handle`;
    /// that connection is no longer reachable through the registry. If
    /// `handle` was bound to another identity, that binding is dropped.
    pub fn register(&self, identity: &str, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.entries().bind(identity, handle)
    }

    /// Bind `identity` to `handle` unless another live connection holds it.
    ///
    /// A stale holder (its writer already gone) is replaced. On refusal the
    /// current holder is returned and nothing changes.
    pub fn register_exclusive(
        &self,
        identity: &str,
        handle: ConnectionHandle,
    ) -> Result<(), ConnectionHandle> {
        let mut entries = self.entries();
        if let Some(holder) = entries.by_identity.get(identity) {
            if *holder != handle && !holder.is_closed() {
                return Err(holder.clone());
            }
        }
        entries.bind(identity, handle);
        Ok(())
    }

    /// The connection currently bound to `identity`, if any.
    pub fn lookup(&self, identity: &str) -> Option<ConnectionHandle> {
        self.entries().by_identity.get(identity).cloned()
    }

    /// Identity bound to a connection, if any.
    pub fn identity_of(&self, connection: ConnectionId) -> Option<String> {
        self.entries().by_connection.get(&connection).cloned()
    }

    /// Remove whatever identity `connection` is bound to.
    /// Returns the identity removed; unknown connections are a no-op.
    pub fn unregister(&self, connection: ConnectionId) -> Option<String> {
        let mut entries = self.entries();
        let identity = entries.by_connection.remove(&connection)?;

        let owned = entries
            .by_identity
            .get(&identity)
            .is_some_and(|h| h.id() == connection);
        if owned {
            entries.by_identity.remove(&identity);
        }
        Some(identity)
    }

    /// Every identity with a bound connection, sorted.
    pub fn online_identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries().by_identity.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries().by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// GET /api/presence — identities currently connected. JWT auth required.
pub async fn get_presence(State(state): State<AppState>, _claims: Claims) -> Json<Vec<String>> {
    Json(state.presence.online_identities())
}
