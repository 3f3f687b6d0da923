//! Session mode resolution.
//!
//! Every cart operation decides between the guest backend and the server
//! cart by asking [`SessionResolver::mode`]. The answer is recomputed from the
//! stored credential and the current time on each call, so a token that
//! expires between two operations flips the second one into guest mode.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Which backend a cart operation talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// No live credential; the cart lives in local persistence.
    Guest,
    /// Live credential; the server owns the cart.
    Authenticated,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::Authenticated => f.write_str("authenticated"),
        }
    }
}

// =============================================================================
// Credential Store
// =============================================================================

/// Source of the shopper's access token.
pub trait CredentialStore: Send + Sync {
    /// The stored token, if any.
    fn get(&self) -> Option<SecretString>;
}

/// In-memory credential store. Set on login, cleared on logout.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    token: Arc<RwLock<Option<SecretString>>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(token);
        store
    }

    /// Replace the stored token.
    pub fn set(&self, token: impl Into<String>) {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(SecretString::from(token.into()));
    }

    /// Remove the stored token.
    pub fn clear(&self) {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = None;
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

/// Credential store backed by a token file.
///
/// A missing or empty file means no credential.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write `token` to the file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn store(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token.trim())
    }

    /// Delete the token file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be removed.
    pub fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<SecretString> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        let token = raw.trim();
        if token.is_empty() {
            return None;
        }
        Some(SecretString::from(token.to_string()))
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Wall-clock source used for credential expiry checks.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves the session mode from the credential store on every call.
#[derive(Clone)]
pub struct SessionResolver {
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl SessionResolver {
    /// Create a resolver over `credentials` using `clock` for expiry checks.
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self { credentials, clock }
    }

    /// Resolve the current mode. Never fails; anything unexpected is guest.
    #[must_use]
    pub fn mode(&self) -> SessionMode {
        let live = self
            .credentials
            .get()
            .is_some_and(|token| token_is_live(token.expose_secret(), self.clock.now_millis()));

        if live {
            SessionMode::Authenticated
        } else {
            SessionMode::Guest
        }
    }
}

/// Whether `token` is a well-formed three-segment token whose `exp` claim
/// (seconds since epoch) lies after `now_millis`.
#[must_use]
pub fn token_is_live(token: &str, now_millis: i64) -> bool {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        debug!("Credential is not a three-segment token");
        return false;
    };

    let Some(exp) = decode_claims(payload)
        .as_ref()
        .and_then(|claims| claims.get("exp"))
        .and_then(serde_json::Value::as_f64)
    else {
        debug!("Credential has no readable exp claim");
        return false;
    };

    #[allow(clippy::cast_precision_loss)] // millisecond timestamps fit comfortably in f64
    let now = now_millis as f64;
    exp * 1000.0 > now
}

/// Decode a token's claims segment. Accepts both base64 alphabets, with or without padding.
fn decode_claims(segment: &str) -> Option<serde_json::Value> {
    let normalized: String = segment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD.decode(normalized).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.is_object().then_some(claims)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, mint_token};

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_live_token() {
        let token = mint_token(NOW / 1000 + 60);
        assert!(token_is_live(&token, NOW));
    }

    #[test]
    fn test_expired_token() {
        let token = mint_token(NOW / 1000 - 1);
        assert!(!token_is_live(&token, NOW));
        // exp exactly at now is not live
        let token = mint_token(NOW / 1000);
        assert!(!token_is_live(&token, NOW));
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        assert!(!token_is_live("", NOW));
        assert!(!token_is_live("opaque-session-token", NOW));
        assert!(!token_is_live("a.b", NOW));
        assert!(!token_is_live("a.b.c.d", NOW));
        assert!(!token_is_live("header.%%%.sig", NOW));
    }

    #[test]
    fn test_claims_without_numeric_exp() {
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"u1","exp":"tomorrow"}"#);
        assert!(!token_is_live(&format!("h.{payload}.s"), NOW));

        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"u1"}"#);
        assert!(!token_is_live(&format!("h.{payload}.s"), NOW));

        let payload = URL_SAFE_NO_PAD.encode("[1,2,3]");
        assert!(!token_is_live(&format!("h.{payload}.s"), NOW));
    }

    #[test]
    fn test_padded_standard_alphabet_accepted() {
        let payload =
            base64::engine::general_purpose::STANDARD.encode(br#"{"exp":1700000060,"n":"??>"}"#);
        assert!(payload.contains('=') || payload.contains('/') || payload.contains('+'));
        assert!(token_is_live(&format!("h.{payload}.s"), NOW));
    }

    #[test]
    fn test_fractional_exp() {
        let payload = URL_SAFE_NO_PAD.encode(r#"{"exp":1700000000.5}"#);
        assert!(token_is_live(&format!("h.{payload}.s"), NOW));
        assert!(!token_is_live(&format!("h.{payload}.s"), NOW + 500));
    }

    #[test]
    fn test_resolver_rechecks_on_every_call() {
        let clock = Arc::new(ManualClock::new(NOW));
        let credentials = MemoryCredentialStore::with_token(mint_token(NOW / 1000 + 10));
        let resolver = SessionResolver::new(Arc::new(credentials.clone()), clock.clone());

        assert_eq!(resolver.mode(), SessionMode::Authenticated);

        clock.advance_millis(10_000);
        assert_eq!(resolver.mode(), SessionMode::Guest);

        credentials.set(mint_token(NOW / 1000 + 3600));
        assert_eq!(resolver.mode(), SessionMode::Authenticated);

        credentials.clear();
        assert_eq!(resolver.mode(), SessionMode::Guest);
    }

    #[test]
    fn test_file_credential_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("vv-token-{}", uuid::Uuid::new_v4()));
        let store = FileCredentialStore::new(dir.join("token"));
        assert!(store.get().is_none());

        store.store("  abc.def.ghi\n").unwrap();
        assert_eq!(store.get().unwrap().expose_secret(), "abc.def.ghi");

        store.remove().unwrap();
        assert!(store.get().is_none());
        // removing twice is fine
        store.remove().unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }
}
