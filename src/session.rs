//! Session binder
//!
//! Associates a wallet address with an in-progress OAuth flow so the eventual
//! verification record is stamped with the right wallet. The session id
//! rides through the OAuth `state` parameter and the entry is consumed
//! exactly once by the callback.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

const CODE_VERIFIER_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub wallet_address: String,
    pub code_verifier: String,
}

#[derive(Default)]
pub struct SessionBinder {
    sessions: Mutex<HashMap<String, PendingAuth>>,
}

impl SessionBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a wallet and returns the session id the client passes to the
    /// auth-start route.
    pub fn bind_wallet(&self, wallet_address: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        let code_verifier: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CODE_VERIFIER_LEN)
            .map(char::from)
            .collect();

        self.sessions.lock().insert(
            session_id.clone(),
            PendingAuth {
                wallet_address: wallet_address.to_string(),
                code_verifier,
            },
        );
        session_id
    }

    /// Peeks at a pending session without consuming it (auth-start needs the
    /// verifier while the callback is still outstanding).
    pub fn get(&self, session_id: &str) -> Option<PendingAuth> {
        self.sessions.lock().get(session_id).cloned()
    }

    /// Consumes the session at callback time. A second callback with the
    /// same state finds nothing.
    pub fn take(&self, session_id: &str) -> Option<PendingAuth> {
        self.sessions.lock().remove(session_id)
    }
}
