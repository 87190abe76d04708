//! In-memory session store
//!
//! Maps opaque auth tokens to user ids. Injected into both services as a
//! collaborator; login and password handling live outside this core, they
//! only call [`SessionStore::issue`]. Tokens are never persisted.

use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Opaque-token session map shared by all request handlers
#[derive(Debug, Default)]
pub struct SessionStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh token for a user and return it
    pub fn issue(&self, user_id: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens
            .write()
            .expect("session store lock poisoned")
            .insert(token.clone(), user_id.to_string());
        token
    }

    /// Resolve a token to a user id, if the session exists
    pub fn lookup(&self, token: &str) -> Option<String> {
        self.tokens
            .read()
            .expect("session store lock poisoned")
            .get(token)
            .cloned()
    }

    /// Drop a session; returns true if the token existed
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens
            .write()
            .expect("session store lock poisoned")
            .remove(token)
            .is_some()
    }
}
