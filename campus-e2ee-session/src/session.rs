//! Session manager: identity lifecycle, key exchange, message encryption.

use crate::config::{FallbackPolicy, PeerKeyChangePolicy, RecoveryPolicy, SessionConfig};
use crate::directory::KeyDirectory;
use crate::error::{SessionError, StoreError};
use crate::events::{EventSink, SessionAction, SessionEvent, TracingEventSink};
use crate::storage::LocalKeyStore;
use crate::types::*;

use campus_e2ee::{
    decrypt, decrypt_private_key, derive_shared_key, encrypt, encrypt_private_key,
    export_public_key, import_public_key, wire, CryptoError, KeyPair, PublicKey, SymmetricKey,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use zeroize::Zeroizing;

// ---------------------------------------------------------------------------
// In-memory session state
// ---------------------------------------------------------------------------

struct Inner {
    state: SessionState,
    identity: Option<Arc<KeyPair>>,
    /// Derived per-peer secrets. Never persisted.
    shared: HashMap<PeerId, Arc<SymmetricKey>>,
    /// Latest known public key per peer, mirrored to the local store.
    peer_keys: HashMap<PeerId, PublicKey>,
    /// False once the local store has failed this session.
    persistent: bool,
}

impl Inner {
    fn empty() -> Self {
        Self {
            state: SessionState::Uninitialized,
            identity: None,
            shared: HashMap::new(),
            peer_keys: HashMap::new(),
            persistent: true,
        }
    }
}

/// Returns the session to `Uninitialized` unless disarmed.
struct ResetOnDrop<'a> {
    inner: &'a RwLock<Inner>,
    armed: bool,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Inner::empty();
        }
    }
}

// ---------------------------------------------------------------------------
// Session manager
// ---------------------------------------------------------------------------

/// One logical user's E2EE session.
///
/// Owned by the application's auth/session component and shared by handle
/// (`Arc<SessionManager>`) with whatever sends or renders messages.
pub struct SessionManager {
    user: PeerId,
    store: Arc<dyn LocalKeyStore>,
    directory: Arc<dyn KeyDirectory>,
    events: Arc<dyn EventSink>,
    config: SessionConfig,
    /// Serializes `initialize` and `clear_keys`.
    lifecycle: tokio::sync::Mutex<()>,
    inner: RwLock<Inner>,
}

impl SessionManager {
    /// Create an uninitialized session with default policies.
    pub fn new(
        user: impl Into<PeerId>,
        store: Arc<dyn LocalKeyStore>,
        directory: Arc<dyn KeyDirectory>,
    ) -> Self {
        Self {
            user: user.into(),
            store,
            directory,
            events: Arc::new(TracingEventSink),
            config: SessionConfig::default(),
            lifecycle: tokio::sync::Mutex::new(()),
            inner: RwLock::new(Inner::empty()),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn user(&self) -> &PeerId {
        &self.user
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // Readers never observe a half-applied update, so a poisoned lock is
    // still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        self.events.record(event);
    }

    fn identity(&self) -> Result<Arc<KeyPair>, SessionError> {
        let inner = self.read();
        match (&inner.state, &inner.identity) {
            (SessionState::Ready, Some(pair)) => Ok(pair.clone()),
            _ => Err(SessionError::NotInitialized),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Restore or create this user's identity and publish its public key.
    ///
    /// Concurrent callers queue behind the first; later ones return
    /// [`InitOutcome::AlreadyReady`]. A stored identity that cannot be
    /// unwrapped is replaced under [`RecoveryPolicy::Regenerate`] and
    /// refused with [`SessionError::WrongPassword`] under
    /// [`RecoveryPolicy::Strict`]. If the local store is unavailable the
    /// identity lives in memory for this session only.
    pub async fn initialize(&self, password: &str) -> Result<InitOutcome, SessionError> {
        let _guard = self.lifecycle.lock().await;

        if self.read().state == SessionState::Ready {
            return Ok(InitOutcome::AlreadyReady);
        }
        self.write().state = SessionState::Initializing;

        // Reset on error, and on drop if the caller abandons this future.
        let mut reset = ResetOnDrop {
            inner: &self.inner,
            armed: true,
        };
        let outcome = self.load_or_create(password).await?;
        reset.armed = false;
        Ok(outcome)
    }

    async fn load_or_create(&self, password: &str) -> Result<InitOutcome, SessionError> {
        let password = Zeroizing::new(password.to_string());
        let mut persistent = true;
        tracing::debug!(user = %self.user, "initializing session");

        let stored = match self.store.load_identity() {
            Ok(stored) => stored,
            Err(e) => {
                persistent = false;
                self.emit(
                    SessionEvent::identity_event(&self.user, SessionAction::StorageFallback)
                        .with_failure()
                        .with_detail(e.to_string()),
                );
                None
            }
        };

        let (pair, outcome) = match stored {
            Some(stored) => match self.unwrap_identity(&stored, &password).await {
                Ok(pair) => (pair, InitOutcome::Restored),
                Err(SessionError::Crypto(e)) => match self.config.recovery {
                    RecoveryPolicy::Strict => {
                        self.emit(
                            SessionEvent::identity_event(&self.user, SessionAction::IdentityRejected)
                                .with_failure()
                                .with_detail(e.to_string()),
                        );
                        return Err(SessionError::WrongPassword);
                    }
                    RecoveryPolicy::Regenerate => (KeyPair::generate(), InitOutcome::Regenerated),
                },
                Err(e) => return Err(e),
            },
            None => (KeyPair::generate(), InitOutcome::Generated),
        };

        let public = export_public_key(pair.public_key());
        let fingerprint = pair.public_key().fingerprint();

        let pair = if outcome == InitOutcome::Restored {
            pair
        } else {
            let (pair, wrapped) = self.wrap_identity(pair, &password).await?;
            if persistent {
                let record = StoredIdentity {
                    public_key: public.clone(),
                    encrypted_private_key: wrapped,
                };
                if let Err(e) = self.store.save_identity(&record) {
                    persistent = false;
                    self.emit(
                        SessionEvent::identity_event(&self.user, SessionAction::StorageFallback)
                            .with_failure()
                            .with_detail(e.to_string()),
                    );
                }
            }
            pair
        };

        let mut peer_keys = HashMap::new();
        if persistent {
            match self.store.load_peer_directory() {
                Ok(entries) => {
                    for (peer, encoded) in entries {
                        match import_public_key(&encoded) {
                            Ok(key) => {
                                peer_keys.insert(peer, key);
                            }
                            Err(e) => tracing::warn!(peer = %peer, error = %e, "skipping unreadable peer key"),
                        }
                    }
                }
                Err(e) => {
                    persistent = false;
                    self.emit(
                        SessionEvent::identity_event(&self.user, SessionAction::StorageFallback)
                            .with_failure()
                            .with_detail(e.to_string()),
                    );
                }
            }
        }

        {
            let mut inner = self.write();
            inner.identity = Some(Arc::new(pair));
            inner.shared.clear();
            inner.peer_keys = peer_keys;
            inner.persistent = persistent;
            inner.state = SessionState::Ready;
        }

        let action = match outcome {
            InitOutcome::Restored => SessionAction::IdentityRestored,
            InitOutcome::Regenerated => SessionAction::IdentityRegenerated,
            _ => SessionAction::IdentityGenerated,
        };
        self.emit(SessionEvent::identity_event(&self.user, action).with_detail(fingerprint));

        match self.directory.publish(&self.user, &public).await {
            Ok(()) => self.emit(SessionEvent::identity_event(&self.user, SessionAction::IdentityPublished)),
            Err(e) => self.emit(
                SessionEvent::identity_event(&self.user, SessionAction::PublishFailed)
                    .with_failure()
                    .with_detail(e.to_string()),
            ),
        }

        Ok(outcome)
    }

    /// Unwrap off the async runtime; PBKDF2 at production cost takes
    /// hundreds of milliseconds.
    async fn unwrap_identity(
        &self,
        stored: &StoredIdentity,
        password: &Zeroizing<String>,
    ) -> Result<KeyPair, SessionError> {
        let wrapped = stored.encrypted_private_key.clone();
        let expected = stored.public_key.clone();
        let password = password.clone();
        let params = self.config.kdf;

        tokio::task::spawn_blocking(move || {
            let pair = decrypt_private_key(&wrapped, &password, params)?;
            // A record whose halves disagree is as unusable as a wrong password.
            let declared = import_public_key(&expected)
                .map_err(|_| CryptoError::WrongPasswordOrCorruptKey)?;
            if !declared.ct_eq(pair.public_key()) {
                return Err(CryptoError::WrongPasswordOrCorruptKey);
            }
            Ok(pair)
        })
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?
        .map_err(SessionError::from)
    }

    async fn wrap_identity(
        &self,
        pair: KeyPair,
        password: &Zeroizing<String>,
    ) -> Result<(KeyPair, String), SessionError> {
        let password = password.clone();
        let params = self.config.kdf;

        tokio::task::spawn_blocking(move || {
            let wrapped = encrypt_private_key(&pair, &password, params)?;
            Ok::<_, CryptoError>((pair, wrapped))
        })
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?
        .map_err(SessionError::from)
    }

    /// Forget the identity, every derived secret, and every stored record.
    ///
    /// Memory is wiped even if the store cannot be cleared; that failure is
    /// returned afterwards.
    pub async fn clear_keys(&self) -> Result<(), SessionError> {
        let _guard = self.lifecycle.lock().await;

        *self.write() = Inner::empty();

        let cleared = self.store.clear_all();
        let mut event = SessionEvent::identity_event(&self.user, SessionAction::KeysCleared);
        if let Err(e) = &cleared {
            event = event.with_failure().with_detail(e.to_string());
        }
        self.emit(event);
        cleared.map_err(SessionError::from)
    }

    // -----------------------------------------------------------------------
    // Key exchange
    // -----------------------------------------------------------------------

    /// Derive and cache the shared secret with `peer`, recording its key.
    ///
    /// Repeating the call with the same key is a no-op. A different key is
    /// handled per [`PeerKeyChangePolicy`].
    pub async fn exchange_keys(
        &self,
        peer: &PeerId,
        peer_public_key: &str,
    ) -> Result<KeyExchange, SessionError> {
        let identity = self.identity()?;
        let peer_key = import_public_key(peer_public_key)?;

        let (previous, cached) = {
            let inner = self.read();
            (inner.peer_keys.get(peer).copied(), inner.shared.contains_key(peer))
        };

        let outcome = match previous {
            Some(prev) if prev.ct_eq(&peer_key) => {
                if cached {
                    return Ok(KeyExchange::Unchanged);
                }
                KeyExchange::Established
            }
            Some(prev) => {
                let previous_fingerprint = prev.fingerprint();
                let current_fingerprint = peer_key.fingerprint();
                let event = SessionEvent::peer_event(
                    &self.user,
                    peer,
                    SessionAction::PeerKeyChanged {
                        previous: previous_fingerprint.clone(),
                        current: current_fingerprint.clone(),
                    },
                );
                if self.config.peer_key_change == PeerKeyChangePolicy::Reject {
                    self.emit(event.with_failure().with_detail("rejected by policy"));
                    return Err(SessionError::PeerKeyChanged { peer: peer.clone() });
                }
                self.emit(event);
                KeyExchange::Rekeyed {
                    previous_fingerprint,
                    current_fingerprint,
                }
            }
            None => KeyExchange::Established,
        };

        let shared = derive_shared_key(&identity, &peer_key)?;

        let changed = previous.map_or(true, |prev| !prev.ct_eq(&peer_key));
        let saved = self.install_shared_key(&identity, peer, Arc::new(shared), Some(peer_key), changed)?;

        if let Err(e) = saved {
            self.emit(
                SessionEvent::peer_event(&self.user, peer, SessionAction::StorageFallback)
                    .with_failure()
                    .with_detail(e.to_string()),
            );
        }

        self.emit(
            SessionEvent::peer_event(&self.user, peer, SessionAction::KeysExchanged)
                .with_detail(peer_key.fingerprint()),
        );
        Ok(outcome)
    }

    /// Cache `shared` for `peer` if `identity` is still the live one, and
    /// optionally record `peer_key` in memory and in the local store.
    ///
    /// The store write happens under the state lock, so it always lands
    /// before a concurrent `clear_keys` wipes memory and then the store.
    /// Returns the store outcome; a failed save turns persistence off.
    fn install_shared_key(
        &self,
        identity: &Arc<KeyPair>,
        peer: &PeerId,
        shared: Arc<SymmetricKey>,
        peer_key: Option<PublicKey>,
        save: bool,
    ) -> Result<Result<(), StoreError>, SessionError> {
        let mut inner = self.write();
        if !matches!(&inner.identity, Some(current) if Arc::ptr_eq(current, identity)) {
            return Err(SessionError::NotInitialized);
        }
        inner.shared.insert(peer.clone(), shared);

        let Some(peer_key) = peer_key else {
            return Ok(Ok(()));
        };
        inner.peer_keys.insert(peer.clone(), peer_key);
        if !(save && inner.persistent) {
            return Ok(Ok(()));
        }
        let saved = self.store.save_peer_entry(peer, &export_public_key(&peer_key));
        if saved.is_err() {
            inner.persistent = false;
        }
        Ok(saved)
    }

    /// Cached secret, else one derived from the recorded peer key, else a
    /// fresh directory lookup.
    async fn shared_key(&self, peer: &PeerId) -> Result<Arc<SymmetricKey>, SessionError> {
        let identity = self.identity()?;

        let recorded = {
            let inner = self.read();
            if let Some(key) = inner.shared.get(peer) {
                return Ok(key.clone());
            }
            inner.peer_keys.get(peer).copied()
        };

        if let Some(peer_key) = recorded {
            tracing::debug!(user = %self.user, peer = %peer, "deriving from recorded peer key");
            let shared = Arc::new(derive_shared_key(&identity, &peer_key)?);
            // Recorded key is already in the store.
            let _ = self.install_shared_key(&identity, peer, shared.clone(), None, false)?;
            return Ok(shared);
        }

        tracing::debug!(user = %self.user, peer = %peer, "looking up peer key in directory");
        let published = self
            .directory
            .lookup(peer)
            .await?
            .ok_or_else(|| SessionError::NoSharedKey { peer: peer.clone() })?;
        self.exchange_keys(peer, &published).await?;

        self.read()
            .shared
            .get(peer)
            .cloned()
            .ok_or_else(|| SessionError::NoSharedKey { peer: peer.clone() })
    }

    // -----------------------------------------------------------------------
    // Messaging
    // -----------------------------------------------------------------------

    /// Encrypt `plaintext` for `peer`, returning the wire string.
    ///
    /// Under [`FallbackPolicy::FailOpen`] any failure returns `plaintext`
    /// unchanged, so the message goes out unencrypted.
    pub async fn encrypt_for_user(&self, peer: &PeerId, plaintext: &str) -> Result<String, SessionError> {
        let result = async {
            let key = self.shared_key(peer).await?;
            let envelope = encrypt(plaintext, &key)?;
            Ok::<_, SessionError>(wire::serialize(&envelope)?)
        }
        .await;

        match result {
            Ok(wire) => Ok(wire),
            Err(e) => {
                self.emit(
                    SessionEvent::peer_event(&self.user, peer, SessionAction::EncryptDegraded)
                        .with_failure()
                        .with_detail(e.to_string()),
                );
                match self.config.fallback {
                    FallbackPolicy::FailOpen => Ok(plaintext.to_string()),
                    FallbackPolicy::FailClosed => Err(e),
                }
            }
        }
    }

    /// Decrypt a payload received from `peer`.
    ///
    /// Anything that is not a wire envelope is returned unchanged. Under
    /// [`FallbackPolicy::FailOpen`] an envelope that cannot be opened is
    /// returned in its raw form; decrypted garbage is never returned.
    pub async fn decrypt_from_user(&self, peer: &PeerId, payload: &str) -> Result<String, SessionError> {
        if !wire::is_encrypted(payload) {
            return Ok(payload.to_string());
        }

        let result = async {
            let envelope = wire::parse(payload)?;
            let key = self.shared_key(peer).await?;
            Ok::<_, SessionError>(decrypt(&envelope, &key)?)
        }
        .await;

        match result {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                let action = match e {
                    SessionError::Crypto(CryptoError::AuthenticationFailure) => SessionAction::DecryptFailed,
                    _ => SessionAction::DecryptDegraded,
                };
                self.emit(
                    SessionEvent::peer_event(&self.user, peer, action)
                        .with_failure()
                        .with_detail(e.to_string()),
                );
                match self.config.fallback {
                    FallbackPolicy::FailOpen => Ok(payload.to_string()),
                    FallbackPolicy::FailClosed => Err(e),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Portable encoding of this session's public key.
    pub fn get_public_key(&self) -> Result<String, SessionError> {
        Ok(export_public_key(self.identity()?.public_key()))
    }

    pub fn is_initialized(&self) -> bool {
        self.read().state == SessionState::Ready
    }

    pub fn state(&self) -> SessionState {
        self.read().state
    }

    /// Fingerprint of this session's public key, once ready.
    pub fn fingerprint(&self) -> Option<String> {
        self.identity().ok().map(|pair| pair.public_key().fingerprint())
    }

    pub fn has_shared_key(&self, peer: &PeerId) -> bool {
        self.read().shared.contains_key(peer)
    }

    /// Peers with a recorded public key, sorted.
    pub fn known_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.read().peer_keys.keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Whether identity and peer keys are reaching the local store.
    pub fn is_persistent(&self) -> bool {
        self.read().persistent
    }
}
