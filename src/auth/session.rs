use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::access::Role;
use crate::config::AccessToken;

/// Authenticated caller as seen by the robot core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
}

/// In-memory session lookup keyed by bearer token
///
/// Account management and login live outside this service; tokens are
/// provisioned through configuration.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from configured access tokens
    pub fn from_tokens(tokens: &[AccessToken]) -> Self {
        let store = Self::new();
        for token in tokens {
            store.insert(
                &token.token,
                Session {
                    username: token.username.clone(),
                    role: token.role,
                },
            );
        }
        store
    }

    /// Register a session under `token`, replacing any previous one
    pub fn insert(&self, token: &str, session: Session) {
        self.sessions.write().insert(token.to_string(), session);
    }

    /// Resolve a token
    pub fn get(&self, token: &str) -> Option<Session> {
        self.sessions.read().get(token).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tokens() {
        let store = SessionStore::from_tokens(&[
            AccessToken {
                token: "abc".into(),
                username: "alice".into(),
                role: Role::Operator,
            },
            AccessToken {
                token: "def".into(),
                username: "bob".into(),
                role: Role::Viewer,
            },
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("abc").map(|s| s.role), Some(Role::Operator));
        assert!(store.get("nope").is_none());
        assert!(SessionStore::new().is_empty());
    }
}
