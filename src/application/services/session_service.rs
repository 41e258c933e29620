use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::application::ports::{Cache, CacheError};

const SESSION_KEY_PREFIX: &str = "session:";
/// Loads within this window of the last write skip the TTL-preserving
/// rewrite.
const LAZY_REWRITE_AFTER: Duration = Duration::from_secs(60);

pub type SessionAttributes = serde_json::Map<String, serde_json::Value>;

/// Plaintext carried inside the encrypted envelope. User attributes are
/// kept apart from bookkeeping so `load` hands back exactly what `create`
/// received.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionPlaintext {
    attributes: SessionAttributes,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}

/// What actually sits in the external store under `session:{id}`.
#[derive(Debug, Serialize, Deserialize)]
struct SessionEnvelope {
    session_id: String,
    ciphertext: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionHealth {
    pub backend_up: bool,
    pub encryption_ok: bool,
    pub fallback: bool,
}

#[derive(Debug)]
pub enum SessionError {
    BackendUnavailable(String),
    EncryptionFailure(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::BackendUnavailable(msg) => {
                write!(f, "Session backend unavailable: {}", msg)
            }
            SessionError::EncryptionFailure(msg) => write!(f, "Session encryption failed: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

struct InMemorySession {
    plaintext: SessionPlaintext,
    expires_at: DateTime<Utc>,
}

/// Encrypted, TTL-managed sessions over the external cache, with an
/// in-process fallback store that takes over when the backend drops.
/// Fallback sessions do not survive a restart.
pub struct SessionService {
    cipher: Aes256Gcm,
    ttl: Duration,
    external: Arc<dyn Cache>,
    fallback: Mutex<HashMap<String, InMemorySession>>,
    in_fallback: AtomicBool,
}

impl SessionService {
    pub fn new(secret: &str, ttl: Duration, external: Arc<dyn Cache>) -> Self {
        // Key derivation: SHA-256 of the configured secret.
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
            ttl,
            external,
            fallback: Mutex::new(HashMap::new()),
            in_fallback: AtomicBool::new(false),
        }
    }

    pub fn in_fallback_mode(&self) -> bool {
        self.in_fallback.load(Ordering::Relaxed)
    }

    /// Cryptographically random 256-bit id, URL-safe.
    fn generate_session_id() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub async fn create(&self, attributes: SessionAttributes) -> Result<String, SessionError> {
        let session_id = Self::generate_session_id();
        let now = Utc::now();
        let plaintext = SessionPlaintext {
            attributes,
            created_at: now,
            last_accessed_at: now,
        };

        self.store(&session_id, &plaintext, self.ttl).await?;
        Ok(session_id)
    }

    /// Load and TTL-validate a session. Updates `last_accessed_at`;
    /// rewrites the envelope only when the last write is older than the
    /// lazy-rewrite window, preserving the remaining TTL.
    pub async fn load(&self, session_id: &str) -> Option<SessionAttributes> {
        let mut plaintext = self.fetch(session_id).await?;

        let now = Utc::now();
        let stale_for = now - plaintext.last_accessed_at;
        plaintext.last_accessed_at = now;

        if stale_for
            > chrono::Duration::from_std(LAZY_REWRITE_AFTER).unwrap_or(chrono::Duration::zero())
        {
            let remaining = self.remaining_ttl(session_id).await.unwrap_or(self.ttl);
            if let Err(err) = self.store(session_id, &plaintext, remaining).await {
                warn!(error = %err, "Failed to refresh session access time");
            }
        }

        Some(plaintext.attributes)
    }

    /// Replace the session payload. Preserves remaining TTL unless
    /// `extend` restarts the clock.
    pub async fn update(
        &self,
        session_id: &str,
        attributes: SessionAttributes,
        extend: bool,
    ) -> Result<(), SessionError> {
        let Some(mut plaintext) = self.fetch(session_id).await else {
            return Err(SessionError::BackendUnavailable(
                "Session missing".to_string(),
            ));
        };

        plaintext.attributes = attributes;
        plaintext.last_accessed_at = Utc::now();

        let ttl = if extend {
            self.ttl
        } else {
            self.remaining_ttl(session_id).await.unwrap_or(self.ttl)
        };
        self.store(session_id, &plaintext, ttl).await
    }

    pub async fn destroy(&self, session_id: &str) {
        let key = session_key(session_id);
        if !self.in_fallback_mode() {
            if let Err(err) = self.external.delete(&key).await {
                warn!(error = %err, "Failed to delete session from backend");
            }
        }
        let mut fallback = self.fallback.lock().expect("session fallback poisoned");
        fallback.remove(session_id);
    }

    pub async fn health(&self) -> SessionHealth {
        let cache_health = self.external.health().await;

        // A healthy backend flips fallback mode off again.
        if cache_health.ok && self.in_fallback.swap(false, Ordering::Relaxed) {
            info!("Session backend recovered; leaving fallback mode");
        }

        SessionHealth {
            backend_up: cache_health.ok,
            encryption_ok: self.encryption_self_test(),
            fallback: self.in_fallback_mode(),
        }
    }

    fn encryption_self_test(&self) -> bool {
        let sample = b"self-test";
        match self.encrypt(sample) {
            Ok(sealed) => matches!(self.decrypt(&sealed), Ok(plain) if plain == sample),
            Err(_) => false,
        }
    }

    async fn fetch(&self, session_id: &str) -> Option<SessionPlaintext> {
        if !self.in_fallback_mode() {
            match self.external.get(&session_key(session_id)).await {
                Ok(Some(raw)) => return self.open_envelope(session_id, &raw),
                Ok(None) => return self.fetch_fallback(session_id),
                Err(err) => self.enter_fallback(&err),
            }
        }
        self.fetch_fallback(session_id)
    }

    fn fetch_fallback(&self, session_id: &str) -> Option<SessionPlaintext> {
        let mut fallback = self.fallback.lock().expect("session fallback poisoned");
        match fallback.get(session_id) {
            Some(entry) if entry.expires_at > Utc::now() => Some(entry.plaintext.clone()),
            Some(_) => {
                fallback.remove(session_id);
                None
            }
            None => None,
        }
    }

    fn open_envelope(&self, session_id: &str, raw: &[u8]) -> Option<SessionPlaintext> {
        let envelope: SessionEnvelope = serde_json::from_slice(raw).ok()?;
        let sealed = URL_SAFE_NO_PAD.decode(&envelope.ciphertext).ok()?;
        match self.decrypt(&sealed) {
            Ok(plain) => serde_json::from_slice(&plain).ok(),
            Err(err) => {
                // Tamper or key rotation: treat as missing.
                warn!(session_id = %session_id, error = %err, "Session decrypt failed");
                None
            }
        }
    }

    async fn store(
        &self,
        session_id: &str,
        plaintext: &SessionPlaintext,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let serialized = serde_json::to_vec(plaintext)
            .map_err(|e| SessionError::EncryptionFailure(e.to_string()))?;
        let sealed = self.encrypt(&serialized)?;
        let envelope = SessionEnvelope {
            session_id: session_id.to_string(),
            ciphertext: URL_SAFE_NO_PAD.encode(sealed),
        };
        let raw = serde_json::to_vec(&envelope)
            .map_err(|e| SessionError::EncryptionFailure(e.to_string()))?;

        if !self.in_fallback_mode() {
            match self.external.set(&session_key(session_id), &raw, ttl).await {
                Ok(()) => return Ok(()),
                Err(err) => self.enter_fallback(&err),
            }
        }

        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        let mut fallback = self.fallback.lock().expect("session fallback poisoned");
        fallback.insert(
            session_id.to_string(),
            InMemorySession {
                plaintext: plaintext.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn remaining_ttl(&self, session_id: &str) -> Option<Duration> {
        if self.in_fallback_mode() {
            let fallback = self.fallback.lock().expect("session fallback poisoned");
            let entry = fallback.get(session_id)?;
            (entry.expires_at - Utc::now()).to_std().ok()
        } else {
            self.external.ttl(&session_key(session_id)).await.ok()?
        }
    }

    fn enter_fallback(&self, err: &CacheError) {
        if !self.in_fallback.swap(true, Ordering::Relaxed) {
            warn!(error = %err, "Session backend unreachable; entering in-memory fallback mode");
        }
    }

    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, SessionError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plain)
            .map_err(|e| SessionError::EncryptionFailure(e.to_string()))?;
        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, SessionError> {
        if sealed.len() < 12 {
            return Err(SessionError::EncryptionFailure(
                "Sealed payload too short".to_string(),
            ));
        }
        let (nonce, ciphertext) = sealed.split_at(12);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| SessionError::EncryptionFailure(e.to_string()))
    }
}

fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::MemoryCache;

    fn service() -> SessionService {
        SessionService::new(
            "test-secret",
            Duration::from_secs(3600),
            Arc::new(MemoryCache::new()),
        )
    }

    fn attributes(pairs: &[(&str, serde_json::Value)]) -> SessionAttributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_load_round_trip() {
        let sessions = service();
        let payload = attributes(&[
            ("auth", serde_json::json!(true)),
            ("user_id", serde_json::json!("operator")),
        ]);

        let id = sessions.create(payload.clone()).await.unwrap();
        assert!(id.len() >= 43); // 256 bits, URL-safe encoded

        let loaded = sessions.load(&id).await.unwrap();
        assert_eq!(loaded, payload);
    }

    #[tokio::test]
    async fn test_wrong_key_reads_as_missing() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let writer = SessionService::new("secret-a", Duration::from_secs(3600), cache.clone());
        let reader = SessionService::new("secret-b", Duration::from_secs(3600), cache);

        let id = writer
            .create(attributes(&[("auth", serde_json::json!(true))]))
            .await
            .unwrap();

        assert!(writer.load(&id).await.is_some());
        assert!(reader.load(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_attributes() {
        let sessions = service();
        let id = sessions
            .create(attributes(&[("auth", serde_json::json!(false))]))
            .await
            .unwrap();

        sessions
            .update(&id, attributes(&[("auth", serde_json::json!(true))]), false)
            .await
            .unwrap();

        let loaded = sessions.load(&id).await.unwrap();
        assert_eq!(loaded.get("auth"), Some(&serde_json::json!(true)));
    }

    #[tokio::test]
    async fn test_destroy_removes_session() {
        let sessions = service();
        let id = sessions.create(SessionAttributes::new()).await.unwrap();
        assert!(sessions.load(&id).await.is_some());

        sessions.destroy(&id).await;
        assert!(sessions.load(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_health_reports_encryption_ok() {
        let sessions = service();
        let health = sessions.health().await;
        assert!(health.backend_up);
        assert!(health.encryption_ok);
        assert!(!health.fallback);
    }
}
