//! Customer session presence.
//!
//! The session is an opaque bearer token issued by the backend at sign-in.
//! Nothing here inspects it: the controller only asks whether one exists,
//! and the REST client attaches it to outgoing requests.
//!
//! Every sign-in and sign-out starts a new generation. Work started under
//! one generation must not write its results into local state once the
//! generation has moved on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};

/// Shared handle to the current session token.
///
/// Cheaply cloneable; every clone sees sign-in and sign-out.
#[derive(Clone, Default)]
pub struct Session {
    token: Arc<RwLock<Option<SecretString>>>,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl Session {
    /// A session with no signed-in customer.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session already holding a token.
    #[must_use]
    pub fn with_token(token: SecretString) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token))),
            generation: Arc::default(),
        }
    }

    /// Store a token, replacing any previous one.
    pub fn sign_in(&self, token: SecretString) {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(token);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Forget the token.
    pub fn sign_out(&self) {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Counter bumped by every sign-in and sign-out.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether no sign-in or sign-out happened since `generation` was read.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Whether a token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// `Authorization` header value, if signed in.
    pub(crate) fn authorization(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }
}
